// ============================================================
// Layer 5 — VGG Classifier with Attention Gates
// ============================================================
// The network is described by ONE table (ARCHITECTURE below) and
// built by ONE routine (ImageClassifierConfig::init). Change the
// table, not the code, to change the architecture.
//
// Every convolution block:
//   conv 3x3 (same padding) → ReLU → [attention] → batch-norm → [dropout]
//
// Every stage: its blocks, then 2x2 max-pool, then [dropout].
//
//   stage 1:  64  64                 pool
//   stage 2: 128 128                 pool
//   stage 3: 256 256 256             pool
//   stage 4: 512 512 512             pool
//   stage 5: 512 512 512             pool  dropout 0.5
//   head:    flatten → dense 512 → ReLU → batch-norm → dropout 0.5
//            → dense 10 → softmax
//
// The last block of stages 1–4 carries an attention gate
// (attention_1 .. attention_4); stage 5's last block does not.
// The gate sits between ReLU and batch-norm. Both asymmetries
// are part of the architecture the saved weights were trained
// with and are kept as-is.
//
// Input layout: images arrive as [N, 32, 32, 3] (NHWC) and are
// permuted to NCHW, which is what Burn's Conv2d expects.
//
// Kernels of every conv and of the first dense layer carry an
// L2 penalty (0.0005 · Σw²) that the trainer adds to the loss.
//
// Reference: Simonyan & Zisserman (2015) Very Deep Convolutional Networks
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig,
        Dropout, DropoutConfig,
        Initializer,
        Linear, LinearConfig,
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::{relu, softmax},
};
use thiserror::Error;

use crate::domain::image::{IMAGE_CHANNELS, IMAGE_HEIGHT, IMAGE_WIDTH, NUM_CLASSES};
use crate::ml::attention::AttentionGate;

// ─── Architecture Table ───────────────────────────────────────────────────────

/// One convolution block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockSpec {
    /// Output channels of the 3x3 convolution
    pub filters:   usize,
    /// Stage number of the attention gate after ReLU, if any
    pub attention: Option<usize>,
    /// Dropout rate after batch-norm, if any
    pub dropout:   Option<f64>,
}

/// One stage: blocks, then max-pool, then optional dropout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSpec {
    pub blocks:            &'static [BlockSpec],
    pub post_pool_dropout: Option<f64>,
}

const fn conv(filters: usize, dropout: f64) -> BlockSpec {
    BlockSpec { filters, attention: None, dropout: Some(dropout) }
}

const fn gated(filters: usize, stage: usize) -> BlockSpec {
    BlockSpec { filters, attention: Some(stage), dropout: None }
}

const fn plain(filters: usize) -> BlockSpec {
    BlockSpec { filters, attention: None, dropout: None }
}

pub const ARCHITECTURE: [StageSpec; 5] = [
    StageSpec { blocks: &[conv(64, 0.3), gated(64, 1)], post_pool_dropout: None },
    StageSpec { blocks: &[conv(128, 0.4), gated(128, 2)], post_pool_dropout: None },
    StageSpec { blocks: &[conv(256, 0.4), conv(256, 0.4), gated(256, 3)], post_pool_dropout: None },
    StageSpec { blocks: &[conv(512, 0.4), conv(512, 0.4), gated(512, 4)], post_pool_dropout: None },
    StageSpec { blocks: &[conv(512, 0.4), conv(512, 0.4), plain(512)], post_pool_dropout: Some(0.5) },
];

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("input shape mismatch: expected [N, 32, 32, 3], got {actual:?}")]
    ShapeMismatch { actual: Vec<usize> },

    #[error("class count mismatch: expected {expected}, got {actual}")]
    ClassCountMismatch { expected: usize, actual: usize },

    #[error("empty input batch")]
    EmptyBatch,
}

/// Reject anything that is not a non-empty [N, 32, 32, 3] batch.
pub fn check_input_dims(dims: [usize; 4]) -> Result<(), ModelError> {
    if dims[1..] != [IMAGE_HEIGHT, IMAGE_WIDTH, IMAGE_CHANNELS] {
        return Err(ModelError::ShapeMismatch { actual: dims.to_vec() });
    }
    if dims[0] == 0 {
        return Err(ModelError::EmptyBatch);
    }
    Ok(())
}

/// Glorot-uniform kernels, the usual choice for this VGG variant
const GLOROT: Initializer = Initializer::XavierUniform { gain: 1.0 };

// ─── Configuration ────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct ImageClassifierConfig {
    #[config(default = "10")]
    pub num_classes: usize,

    /// L2 penalty coefficient on conv and hidden dense kernels
    #[config(default = "0.0005")]
    pub weight_decay: f64,

    #[config(default = "512")]
    pub hidden_units: usize,

    #[config(default = "0.5")]
    pub head_dropout: f64,

    /// Weight of the current batch in the running statistics
    /// (0.01 ↔ a moving-average momentum of 0.99)
    #[config(default = "0.01")]
    pub bn_momentum: f64,

    #[config(default = "1e-3")]
    pub bn_epsilon: f64,
}

impl ImageClassifierConfig {
    /// The output layer must match the dataset's class count.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.num_classes != NUM_CLASSES {
            return Err(ModelError::ClassCountMismatch {
                expected: NUM_CLASSES,
                actual:   self.num_classes,
            });
        }
        Ok(())
    }

    /// Assemble the network from the ARCHITECTURE table.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ImageClassifier<B> {
        let mut in_channels = IMAGE_CHANNELS;
        let mut stages      = Vec::with_capacity(ARCHITECTURE.len());

        for spec in ARCHITECTURE.iter() {
            let mut blocks = Vec::with_capacity(spec.blocks.len());
            for block in spec.blocks {
                blocks.push(self.build_block(in_channels, block, device));
                in_channels = block.filters;
            }
            stages.push(ConvStage {
                blocks,
                pool:    MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
                dropout: spec.post_pool_dropout.map(|p| DropoutConfig::new(p).init()),
            });
        }

        // 32 / 2^5 = 1 → the flattened feature vector has `in_channels` entries
        let spatial = IMAGE_HEIGHT >> ARCHITECTURE.len();
        let flat    = in_channels * spatial * spatial;

        ImageClassifier {
            stages,
            hidden:       LinearConfig::new(flat, self.hidden_units)
                .with_initializer(GLOROT)
                .init(device),
            hidden_norm:  self.batch_norm(self.hidden_units, device),
            dropout:      DropoutConfig::new(self.head_dropout).init(),
            output:       LinearConfig::new(self.hidden_units, self.num_classes)
                .with_initializer(GLOROT)
                .init(device),
            weight_decay: self.weight_decay,
        }
    }

    fn build_block<B: Backend>(
        &self,
        in_channels: usize,
        spec:        &BlockSpec,
        device:      &B::Device,
    ) -> ConvBlock<B> {
        ConvBlock {
            conv: Conv2dConfig::new([in_channels, spec.filters], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .with_initializer(GLOROT)
                .init(device),
            attention: spec.attention.map(AttentionGate::new),
            norm:      self.batch_norm(spec.filters, device),
            dropout:   spec.dropout.map(|p| DropoutConfig::new(p).init()),
        }
    }

    fn batch_norm<B: Backend>(&self, channels: usize, device: &B::Device) -> BatchNorm<B> {
        BatchNormConfig::new(channels)
            .with_momentum(self.bn_momentum)
            .with_epsilon(self.bn_epsilon)
            .init(device)
    }
}

// ─── Modules ──────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv:      Conv2d<B>,
    pub attention: Option<AttentionGate>,
    pub norm:      BatchNorm<B>,
    pub dropout:   Option<Dropout>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.conv.forward(x));
        let x = match &self.attention {
            Some(gate) => gate.forward(x),
            None       => x,
        };
        let x = self.norm.forward(x);
        match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None          => x,
        }
    }
}

#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    pub blocks:  Vec<ConvBlock<B>>,
    pub pool:    MaxPool2d,
    pub dropout: Option<Dropout>,
}

impl<B: Backend> ConvStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.blocks.iter().fold(x, |x, block| block.forward(x));
        let x = self.pool.forward(x);
        match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None          => x,
        }
    }
}

#[derive(Module, Debug)]
pub struct ImageClassifier<B: Backend> {
    pub stages:       Vec<ConvStage<B>>,
    pub hidden:       Linear<B>,
    pub hidden_norm:  BatchNorm<B>,
    pub dropout:      Dropout,
    pub output:       Linear<B>,
    pub weight_decay: f64,
}

impl<B: Backend> ImageClassifier<B> {
    /// images: [N, 32, 32, 3] → logits: [N, 10]
    pub fn forward_logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = images.permute([0, 3, 1, 2]);
        let x = self.stages.iter().fold(x, |x, stage| stage.forward(x));

        let [n, c, h, w] = x.dims();
        let x = relu(self.hidden.forward(x.reshape([n, c * h * w])));

        // Dense batch-norm: treat each unit as a channel with a 1x1 map
        let units = x.dims()[1];
        let x = self.hidden_norm.forward(x.reshape([n, units, 1, 1])).reshape([n, units]);

        let x = self.dropout.forward(x);
        self.output.forward(x)
    }

    /// images: [N, 32, 32, 3] → class probabilities: [N, 10]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward_logits(images), 1)
    }

    /// `forward` with the input shape checked before any computation.
    pub fn try_forward(&self, images: Tensor<B, 4>) -> Result<Tensor<B, 2>, ModelError> {
        check_input_dims(images.dims())?;
        Ok(self.forward(images))
    }

    /// weight_decay · Σ w² over every conv kernel and the hidden dense kernel
    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        let hidden = self.hidden.weight.val();
        let mut total = (hidden.clone() * hidden).sum();

        for stage in &self.stages {
            for block in &stage.blocks {
                let w = block.conv.weight.val();
                total = total + (w.clone() * w).sum();
            }
        }

        total.mul_scalar(self.weight_decay)
    }

    /// Names of the attention gates in forward order
    pub fn attention_names(&self) -> Vec<String> {
        self.stages
            .iter()
            .flat_map(|s| s.blocks.iter())
            .filter_map(|b| b.attention.as_ref().map(AttentionGate::name))
            .collect()
    }
}
