//! Integration tests for the model factories.
//!
//! Shape checks run on the architecture descriptions; forward passes use
//! small inputs on the NdArray backend.

use burn::optim::GradientsParams;
use burn::prelude::*;
use burn::tensor::Distribution;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;

use mas_core::{Activation, CoreError};
use mas_models::{
    cnn_model_2in, cnn_model_2in_with_feedback, Cnn2InConfig, Cnn2InFeedbackConfig, LayerKind,
};

type TestBackend = NdArray<f32>;
type TrainBackend = Autodiff<NdArray<f32>>;

#[test]
fn test_cnn2in_reference_shapes() {
    let arch = Cnn2InConfig::new((50, 9), (50, 4), 3).architecture().unwrap();

    let inputs: Vec<(String, String)> = arch
        .inputs
        .iter()
        .map(|input| (input.name.clone(), input.shape.to_string()))
        .collect();
    assert_eq!(
        inputs,
        vec![
            ("input_a".to_string(), "(None, 1, 50, 9)".to_string()),
            ("input_b".to_string(), "(None, 1, 50, 4)".to_string()),
        ]
    );
    assert_eq!(arch.output_shape().to_string(), "(None, 3)");
}

#[test]
fn test_feedback_reference_shapes() {
    let arch = Cnn2InFeedbackConfig::new((50, 9), (50, 4), 8, 3)
        .architecture()
        .unwrap();
    assert_eq!(arch.inputs.len(), 3);
    assert_eq!(arch.output_shape().to_string(), "(None, 3)");
}

#[test]
fn test_valid_shapes_give_two_inputs_and_sized_output() {
    for (t, fa, fb, n) in [(4, 1, 1, 1), (10, 3, 7, 2), (50, 9, 4, 3), (64, 2, 16, 5)] {
        let arch = Cnn2InConfig::new((t, fa), (t, fb), n).architecture().unwrap();
        assert_eq!(arch.inputs.len(), 2);
        assert_eq!(arch.output_shape().dims(), &[n]);

        let arch = Cnn2InFeedbackConfig::new((t, fa), (t, fb), 3, n)
            .architecture()
            .unwrap();
        assert_eq!(arch.inputs.len(), 3);
        assert_eq!(arch.output_shape().dims(), &[n]);
    }
}

#[test]
fn test_mismatched_timesteps_fail_immediately() {
    let device = Default::default();
    for (ta, tb) in [(50, 49), (10, 20), (1, 2)] {
        let err = cnn_model_2in::<TestBackend>((ta, 9), (tb, 4), 3, Activation::Softmax, &device)
            .unwrap_err();
        assert!(matches!(err, CoreError::TimestepMismatch { a, b } if a == ta && b == tb));

        let err = cnn_model_2in_with_feedback::<TestBackend>(
            (ta, 9),
            (tb, 4),
            8,
            3,
            Activation::Softmax,
            &device,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::TimestepMismatch { .. }));
    }
}

#[test]
fn test_activation_changes_only_final_layer() {
    let base = Cnn2InFeedbackConfig::new((50, 9), (50, 4), 8, 3);
    let reference = base.architecture().unwrap();

    for activation in Activation::ALL {
        let arch = base.clone().with_activation(activation).architecture().unwrap();
        assert_eq!(arch.layers, reference.layers);
        assert_eq!(arch.inputs, reference.inputs);
        assert_eq!(arch.activation, activation);
    }
}

#[test]
fn test_layer_order_matches_branch_topology() {
    let arch = Cnn2InConfig::default().architecture().unwrap();
    let kinds: Vec<LayerKind> = arch
        .layers
        .iter()
        .filter(|layer| layer.name.ends_with("_a"))
        .map(|layer| layer.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            LayerKind::Input,
            LayerKind::BatchNormalization,
            LayerKind::Conv2d,
            LayerKind::Reshape,
            LayerKind::Lstm,
        ]
    );

    let concat = arch.layer("concatenate").unwrap();
    assert_eq!(concat.inbound, vec!["lstm_a", "lstm_b"]);
}

#[test]
fn test_architecture_param_counts_match_modules() {
    let device = Default::default();

    let config = Cnn2InConfig::default();
    let arch = config.architecture().unwrap();
    let model = config.init::<TestBackend>(&device).unwrap();
    assert_eq!(arch.total_params(), Module::num_params(&model));

    let config = Cnn2InFeedbackConfig::default();
    let arch = config.architecture().unwrap();
    let model = config.init::<TestBackend>(&device).unwrap();
    assert_eq!(arch.total_params(), Module::num_params(&model));
    assert_eq!(arch.non_trainable_params(), 42);
}

#[test]
fn test_forward_passes() {
    let device = Default::default();

    let model = Cnn2InConfig::new((8, 3), (8, 2), 3).init::<TestBackend>(&device).unwrap();
    let a = Tensor::<TestBackend, 4>::random([2, 1, 8, 3], Distribution::Default, &device);
    let b = Tensor::<TestBackend, 4>::random([2, 1, 8, 2], Distribution::Default, &device);
    assert_eq!(model.forward(a.clone(), b.clone()).dims(), [2, 3]);

    let model = Cnn2InFeedbackConfig::new((8, 3), (8, 2), 4, 3)
        .with_activation(Activation::Linear)
        .init::<TestBackend>(&device)
        .unwrap();
    let fb = Tensor::<TestBackend, 3>::random([2, 1, 4], Distribution::Default, &device);
    let logits = model.forward_logits(a.clone(), b.clone(), fb.clone());
    let out = model.forward(a, b, fb);
    let logits: Vec<f32> = logits.into_data().to_vec().unwrap();
    let out: Vec<f32> = out.into_data().to_vec().unwrap();
    assert_eq!(logits, out);
}

#[test]
fn test_models_support_autodiff() {
    let device = Default::default();
    let model = Cnn2InConfig::new((6, 2), (6, 1), 2).init::<TrainBackend>(&device).unwrap();

    let a = Tensor::<TrainBackend, 4>::ones([2, 1, 6, 2], &device);
    let b = Tensor::<TrainBackend, 4>::ones([2, 1, 6, 1], &device);
    let loss = model.forward(a, b).sum();
    let grads = GradientsParams::from_grads(loss.backward(), &model);
    assert!(grads.len() > 0);
}
