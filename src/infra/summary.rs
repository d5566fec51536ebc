// ============================================================
// Layer 6 — Model Summary
// ============================================================
// Writes model.txt: one row per layer with its output shape and
// parameter count, then the totals.
//
//   Layer (type)                  Output Shape            Param #
//   ==============================================================
//   conv2d_1 (Conv2D)             (None, 32, 32, 64)      1792
//   activation_1 (Activation)     (None, 32, 32, 64)      0
//   ...
//   Total params: 15,001,418
//   Trainable params: 14,991,946
//   Non-trainable params: 9,472
//
// Rows are derived from the same ARCHITECTURE table the network
// is built from, so the file always describes the built model.
// Batch-norm running mean/variance count as non-trainable.

use anyhow::{Context, Result};
use std::{collections::HashMap, fmt::Write as _, fs, path::Path, path::PathBuf};

use crate::domain::image::{IMAGE_CHANNELS, IMAGE_HEIGHT, IMAGE_WIDTH};
use crate::ml::model::{ImageClassifierConfig, ARCHITECTURE};

/// File name inside the save directory
pub const SUMMARY_FILE: &str = "model.txt";

const MODEL_NAME: &str = "cifar10vgg";

#[derive(Debug, Clone, PartialEq)]
pub struct LayerRow {
    pub name:          String,
    pub kind:          &'static str,
    /// Shape without the batch dimension
    pub output_shape:  Vec<usize>,
    pub trainable:     usize,
    pub non_trainable: usize,
}

impl LayerRow {
    pub fn params(&self) -> usize {
        self.trainable + self.non_trainable
    }
}

/// Collects rows and numbers layers per type (conv2d_1, conv2d_2, ...).
#[derive(Default)]
struct RowBuilder {
    rows:     Vec<LayerRow>,
    counters: HashMap<&'static str, usize>,
}

impl RowBuilder {
    fn push(&mut self, prefix: &'static str, kind: &'static str, shape: Vec<usize>, trainable: usize, non_trainable: usize) {
        let n = self.counters.entry(prefix).or_insert(0);
        *n += 1;
        let name = format!("{prefix}_{n}");
        self.push_named(name, kind, shape, trainable, non_trainable);
    }

    fn push_named(&mut self, name: String, kind: &'static str, shape: Vec<usize>, trainable: usize, non_trainable: usize) {
        self.rows.push(LayerRow { name, kind, output_shape: shape, trainable, non_trainable });
    }

    fn batch_norm(&mut self, shape: Vec<usize>) {
        let channels = shape.last().copied().unwrap_or(0);
        self.push("batch_normalization", "BatchNormalization", shape, 2 * channels, 2 * channels);
    }
}

/// Layer rows for a network built from `config`.
pub fn layer_rows(config: &ImageClassifierConfig) -> Vec<LayerRow> {
    let mut b = RowBuilder::default();
    let (mut h, mut w, mut c) = (IMAGE_HEIGHT, IMAGE_WIDTH, IMAGE_CHANNELS);

    for stage in ARCHITECTURE.iter() {
        for block in stage.blocks {
            let f = block.filters;
            b.push("conv2d", "Conv2D", vec![h, w, f], 9 * c * f + f, 0);
            b.push("activation", "Activation", vec![h, w, f], 0, 0);
            if let Some(n) = block.attention {
                b.push_named(format!("attention_{n}"), "Lambda", vec![h, w, f], 0, 0);
            }
            b.batch_norm(vec![h, w, f]);
            if block.dropout.is_some() {
                b.push("dropout", "Dropout", vec![h, w, f], 0, 0);
            }
            c = f;
        }
        h /= 2;
        w /= 2;
        b.push("max_pooling2d", "MaxPooling2D", vec![h, w, c], 0, 0);
        if stage.post_pool_dropout.is_some() {
            b.push("dropout", "Dropout", vec![h, w, c], 0, 0);
        }
    }

    let flat   = h * w * c;
    let units  = config.hidden_units;
    let labels = config.num_classes;
    b.push("flatten", "Flatten", vec![flat], 0, 0);
    b.push("dense", "Dense", vec![units], flat * units + units, 0);
    b.push("activation", "Activation", vec![units], 0, 0);
    b.batch_norm(vec![units]);
    b.push("dropout", "Dropout", vec![units], 0, 0);
    b.push("dense", "Dense", vec![labels], units * labels + labels, 0);
    b.push("activation", "Activation", vec![labels], 0, 0);

    b.rows
}

/// 15001418 → "15,001,418"
fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn shape_text(shape: &[usize]) -> String {
    let dims: Vec<String> = shape.iter().map(usize::to_string).collect();
    format!("(None, {})", dims.join(", "))
}

/// Render the table as text.
pub fn render(rows: &[LayerRow]) -> String {
    let rule  = "_".repeat(78);
    let heavy = "=".repeat(78);
    let mut out = String::new();

    // fmt::Write into a String cannot fail
    let _ = writeln!(out, "Model: \"{MODEL_NAME}\"");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "{:<36}{:<28}{}", "Layer (type)", "Output Shape", "Param #");
    let _ = writeln!(out, "{heavy}");
    for (i, row) in rows.iter().enumerate() {
        let label = format!("{} ({})", row.name, row.kind);
        let _ = writeln!(out, "{:<36}{:<28}{}", label, shape_text(&row.output_shape), row.params());
        let _ = writeln!(out, "{}", if i + 1 == rows.len() { &heavy } else { &rule });
    }

    let trainable: usize     = rows.iter().map(|r| r.trainable).sum();
    let non_trainable: usize = rows.iter().map(|r| r.non_trainable).sum();
    let _ = writeln!(out, "Total params: {}", thousands(trainable + non_trainable));
    let _ = writeln!(out, "Trainable params: {}", thousands(trainable));
    let _ = writeln!(out, "Non-trainable params: {}", thousands(non_trainable));
    let _ = writeln!(out, "{rule}");
    out
}

/// Write model.txt into `dir`.
pub fn write_summary(dir: &Path, config: &ImageClassifierConfig) -> Result<PathBuf> {
    let path = dir.join(SUMMARY_FILE);
    let rows = layer_rows(config);
    fs::write(&path, render(&rows))
        .with_context(|| format!("Cannot write model summary to '{}'", path.display()))?;

    tracing::info!("Wrote model summary ({} layers) to '{}'", rows.len(), path.display());
    Ok(path)
}
