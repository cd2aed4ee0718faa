use wdcaption::{
    file::ModelHub,
    processor::{ImagePreprocessor, ImageProcessor, Layout},
    tagger::{Activation, Device, TaggerModel, WdModel},
    tags::LabelTags,
};

mod common;
use common::test_image;

fn run_async<F, T>(future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::runtime::Runtime::new().unwrap().block_on(future)
}

#[test]
fn test_cpu_device_and_activation() {
    assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
    assert!("tpu:0".parse::<Device>().is_err());

    let logits = Activation::Auto.apply(vec![-2.0, 0.0, 3.0]);
    assert!(logits.iter().all(|p| (0.0..=1.0).contains(p)));
    assert_eq!(Activation::Auto.apply(vec![0.2, 0.9]), vec![0.2, 0.9]);
}

#[test]
#[ignore = "downloads a model from the Hugging Face Hub"]
fn test_predict_batch() {
    TaggerModel::init(Device::cpu()).unwrap();
    let hub = ModelHub::new(None).unwrap();
    let repo_id = WdModel::Vit.repo_id();

    let mut model = run_async(TaggerModel::from_pretrained(&hub, repo_id, Activation::Auto)).unwrap();
    let tags = run_async(LabelTags::from_pretrained(&hub, repo_id)).unwrap();
    let processor = ImagePreprocessor::new(448, 448, Layout::Nhwc);

    let image = test_image(200, 300);
    let input_tensor = processor.process_batch(vec![&image, &image]).unwrap();
    let predictions = model.predict(input_tensor).unwrap();

    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions[0].len(), tags.len());
    assert!(predictions[0].iter().all(|p| (0.0..=1.0).contains(p)));
}
