use std::{fs, num::NonZeroUsize, path::Path};

use machine_learning::{
    Device, MlErr, ModelSource, Tensor,
    arch::{ArchSpec, BlockSpec, ChildSpec, HeadConfig, LayerSpec, Side, SplitConfig},
    load, predict,
};
use ndarray::{ArrayD, IxDyn};
use safetensors::{Dtype, tensor::TensorView};
use tempfile::TempDir;

fn tiny_arch() -> ArchSpec {
    let child = |name: &str, layer| ChildSpec {
        name: name.to_string(),
        layer,
    };

    ArchSpec {
        name: "tiny".to_string(),
        input_channels: 3,
        children: vec![
            child(
                "conv1",
                LayerSpec::Conv2d {
                    in_channels: 3,
                    out_channels: 4,
                    kernel_size: 3,
                    stride: 2,
                    padding: 1,
                    bias: false,
                },
            ),
            child(
                "bn1",
                LayerSpec::BatchNorm2d {
                    features: 4,
                    eps: 1e-5,
                },
            ),
            child("relu", LayerSpec::Relu),
            child(
                "layer1",
                LayerSpec::Stage {
                    blocks: vec![BlockSpec {
                        in_channels: 4,
                        out_channels: 8,
                        stride: 2,
                    }],
                },
            ),
            child("avgpool", LayerSpec::AdaptiveAvgPool2d),
            child(
                "fc",
                LayerSpec::Linear {
                    in_features: 8,
                    out_features: 3,
                },
            ),
        ],
    }
}

fn tiny_split() -> SplitConfig {
    SplitConfig {
        architecture: "tiny".to_string(),
        split_index: 3,
        server_children: Some(vec![
            "layer1".to_string(),
            "avgpool".to_string(),
            "fc".to_string(),
        ]),
        head: HeadConfig {
            child: "fc".to_string(),
            flatten: true,
        },
    }
}

fn pseudo_random(len: usize, seed: usize) -> Vec<f32> {
    (0..len)
        .map(|i| ((i * 7919 + seed * 104729) % 23) as f32 / 23.0 - 0.5)
        .collect()
}

type Entry = (String, Vec<usize>, Vec<f32>);

fn entry(name: &str, shape: Vec<usize>, values: Vec<f32>) -> Entry {
    (name.to_string(), shape, values)
}

fn batch_norm(prefix: &str, n: usize) -> Vec<Entry> {
    vec![
        entry(&format!("{prefix}.weight"), vec![n], vec![1.0; n]),
        entry(&format!("{prefix}.bias"), vec![n], pseudo_random(n, 1)),
        entry(&format!("{prefix}.running_mean"), vec![n], pseudo_random(n, 2)),
        entry(&format!("{prefix}.running_var"), vec![n], vec![1.0; n]),
    ]
}

fn tiny_weights(skip: Option<&str>) -> Vec<u8> {
    let mut tensors = vec![entry("conv1.weight", vec![4, 3, 3, 3], pseudo_random(108, 3))];
    tensors.extend(batch_norm("bn1", 4));
    tensors.push(entry("layer1.0.conv1.weight", vec![8, 4, 3, 3], pseudo_random(288, 4)));
    tensors.extend(batch_norm("layer1.0.bn1", 8));
    tensors.push(entry("layer1.0.conv2.weight", vec![8, 8, 3, 3], pseudo_random(576, 5)));
    tensors.extend(batch_norm("layer1.0.bn2", 8));
    tensors.push(entry("layer1.0.downsample.0.weight", vec![8, 4, 1, 1], pseudo_random(32, 6)));
    tensors.extend(batch_norm("layer1.0.downsample.1", 8));
    tensors.push(entry("fc.weight", vec![3, 8], vec![0.0; 24]));
    tensors.push(entry("fc.bias", vec![3], vec![0.0, 5.0, 1.0]));

    let bytes: Vec<(String, Vec<usize>, Vec<u8>)> = tensors
        .into_iter()
        .filter(|(name, ..)| Some(name.as_str()) != skip)
        .map(|(name, shape, values)| (name, shape, bytemuck::cast_slice(&values).to_vec()))
        .collect();

    let views: Vec<(String, TensorView)> = bytes
        .iter()
        .map(|(name, shape, data)| {
            let view = TensorView::new(Dtype::F32, shape.clone(), data).unwrap();
            (name.clone(), view)
        })
        .collect();

    safetensors::serialize(views, &None).unwrap()
}

fn write_source(dir: &Path, weights: Vec<u8>) -> ModelSource {
    let source = ModelSource {
        weights: dir.join("model.safetensors"),
        split: Some(dir.join("split.json")),
        arch: Some(dir.join("arch.json")),
    };

    fs::write(&source.weights, weights).unwrap();
    fs::write(dir.join("split.json"), serde_json::to_vec(&tiny_split()).unwrap()).unwrap();
    fs::write(dir.join("arch.json"), serde_json::to_vec(&tiny_arch()).unwrap()).unwrap();
    source
}

fn image() -> Tensor {
    let x = ArrayD::from_shape_vec(IxDyn(&[1, 3, 8, 8]), pseudo_random(192, 7)).unwrap();
    Tensor::new(x)
}

#[test]
fn client_and_server_segments_chain() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), tiny_weights(None));

    let client = load(&source, Side::Client, Device::Cpu).unwrap();
    let server = load(&source, Side::Server, Device::Cpu).unwrap();

    assert_eq!(client.output_channels(), 4);
    assert_eq!(server.input_channels(), 4);
    assert_eq!(
        server.layer_names().collect::<Vec<_>>(),
        ["layer1", "avgpool", "flatten", "fc"]
    );

    let activation = client.forward(image()).unwrap();
    assert_eq!(activation.shape(), &[1, 4, 4, 4]);
    server.check_input(activation.shape()).unwrap();

    let scores = server.scores(activation).unwrap();
    assert_eq!(scores.shape(), &[1, 3]);

    let prediction = predict(scores.view()).unwrap();
    assert_eq!(prediction[0].index, 1);
}

#[test]
fn forward_pass_is_deterministic_across_devices() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), tiny_weights(None));
    let parallel = Device::Parallel {
        threads: NonZeroUsize::new(2).unwrap(),
    };

    let cpu = load(&source, Side::Client, Device::Cpu).unwrap();
    let par = load(&source, Side::Client, parallel).unwrap();

    let a = cpu.forward(image()).unwrap();
    let b = cpu.forward(image()).unwrap();
    assert_eq!(a, b);

    let c = par.forward(image().to(parallel)).unwrap();
    assert_eq!(c.device(), parallel);
    assert!(
        a.array()
            .iter()
            .zip(c.array().iter())
            .all(|(x, y)| (x - y).abs() < 1e-4)
    );
}

#[test]
fn tensors_on_another_device_are_rejected() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), tiny_weights(None));
    let client = load(&source, Side::Client, Device::Cpu).unwrap();

    let parallel = Device::Parallel {
        threads: NonZeroUsize::new(2).unwrap(),
    };
    let err = client.forward(image().to(parallel)).unwrap_err();
    assert!(matches!(err, MlErr::DeviceMismatch { .. }));
}

#[test]
fn wrong_boundary_shapes_are_caught_before_running() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), tiny_weights(None));
    let server = load(&source, Side::Server, Device::Cpu).unwrap();

    assert!(matches!(
        server.check_input(&[1, 5, 4, 4]),
        Err(MlErr::SizeMismatch { got: 5, expected: 4, .. })
    ));
    assert!(matches!(
        server.check_input(&[1, 4, 16]),
        Err(MlErr::InvalidShape { .. })
    ));
}

#[test]
fn missing_tensors_fail_the_load() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), tiny_weights(Some("layer1.0.downsample.1.running_var")));

    // the client side never reads it
    assert!(load(&source, Side::Client, Device::Cpu).is_ok());

    let err = load(&source, Side::Server, Device::Cpu).err().unwrap();
    assert!(
        matches!(err, MlErr::MissingTensor { name } if name == "layer1.0.downsample.1.running_var")
    );
}

#[test]
fn split_is_checked_against_the_architecture() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), tiny_weights(None));

    let mut split = tiny_split();
    split.split_index = 4;
    fs::write(dir.path().join("split.json"), serde_json::to_vec(&split).unwrap()).unwrap();

    let err = load(&source, Side::Server, Device::Cpu).err().unwrap();
    assert!(matches!(err, MlErr::ArchMismatch(_)));
}
