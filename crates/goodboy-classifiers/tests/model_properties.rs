//! Property tests for model outputs

use candle_core::{Device, Tensor};
use goodboy_classifiers::ImageModel;
use goodboy_core::ModelId;
use proptest::prelude::*;
use std::collections::HashMap;

const SIDE: usize = 2;

fn model(weights: Vec<f32>, bias: Vec<f32>) -> ImageModel {
    let classes = bias.len();
    let tensors = HashMap::from([
        (
            "head.weight".to_string(),
            Tensor::from_vec(weights, (classes, 3 * SIDE * SIDE), &Device::Cpu).unwrap(),
        ),
        (
            "head.bias".to_string(),
            Tensor::from_vec(bias, classes, &Device::Cpu).unwrap(),
        ),
    ]);
    ImageModel::from_tensors(&ModelId::new("prop"), "v1", tensors, Device::Cpu).unwrap()
}

fn head() -> impl Strategy<Value = (Vec<f32>, Vec<f32>, Vec<f32>)> {
    (1usize..6).prop_flat_map(|classes| {
        (
            prop::collection::vec(-4.0f32..4.0, classes * 3 * SIDE * SIDE),
            prop::collection::vec(-4.0f32..4.0, classes),
            prop::collection::vec(0.0f32..1.0, 3 * SIDE * SIDE),
        )
    })
}

proptest! {
    #[test]
    fn probabilities_are_a_distribution((weights, bias, pixels) in head()) {
        let classes = bias.len();
        let model = model(weights, bias);
        let input = Tensor::from_vec(pixels, (1, 3 * SIDE * SIDE), &Device::Cpu).unwrap();

        let probs = model.probabilities(&input).unwrap();

        prop_assert_eq!(probs.len(), classes);
        prop_assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        if classes > 1 {
            let total: f32 = probs.iter().sum();
            prop_assert!((total - 1.0).abs() < 1e-4);
        }
    }
}
