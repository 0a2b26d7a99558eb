//! Multi-input CNN/LSTM models for the exchange bot.

mod blocks;
mod feedback;
mod two_input;

pub use blocks::{ConvBlock, FeatureNorm1d, FeatureNorm2d, NORM_EPSILON, NORM_MOMENTUM};
pub use feedback::{
    cnn_model_2in_with_feedback, Cnn2InFeedback, Cnn2InFeedbackConfig, FEEDBACK_BRANCH_UNITS,
    FEEDBACK_DROPOUT, FEEDBACK_FB_UNITS, FEEDBACK_FILTERS, FEEDBACK_HEAD_UNITS, FEEDBACK_KERNELS,
    FEEDBACK_MERGE_UNITS, FEEDBACK_POOL,
};
pub use two_input::{
    cnn_model_2in, Cnn2In, Cnn2InConfig, CNN2IN_BRANCH_UNITS, CNN2IN_FILTERS, CNN2IN_HEAD_UNITS,
    CNN2IN_KERNEL,
};
