use approx::assert_relative_eq;
use ikonos_toar::core::pipeline::{ESUN_CITATION, TAYLOR_CITATION};
use ikonos_toar::core::{
    AcquisitionContext, AcquisitionInputs, CalibrationParams, CalibrationPipeline,
    ConversionRequest,
};
use ikonos_toar::io::{MemoryEngine, RasterEngine};
use ikonos_toar::types::{Region, ToarError};
use ndarray::Array2;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Reference scene: acquired after the coefficient update, SEA 52.7888
fn reference_scene() -> AcquisitionContext {
    AcquisitionContext::resolve(Some("2005-06-15T10:30:00Z"), None, 52.7888)
        .expect("Failed to resolve acquisition")
        .with_earth_sun_distance(1.0157675)
}

fn scene_with(bands: &[&str], shape: (usize, usize), dn: f64) -> MemoryEngine {
    let mut engine = MemoryEngine::new();
    for band in bands {
        engine.insert(band, Array2::from_elem(shape, dn));
    }
    engine
}

fn temporaries(engine: &MemoryEngine) -> Vec<&str> {
    engine
        .layer_names()
        .into_iter()
        .filter(|name| name.starts_with("tmp."))
        .collect()
}

#[test]
fn test_red_reference_scene() {
    init_logging();
    let mut engine = scene_with(&["Red"], (2, 3), 100.0);
    let pipeline = CalibrationPipeline::new(CalibrationParams::default());

    let requests = [ConversionRequest::from_source("Red")];
    let outputs = pipeline
        .run_with_context(&mut engine, &requests, &reference_scene())
        .expect("Calibration failed");
    assert_eq!(outputs, vec!["Red.toar"]);
    assert_eq!(engine.layer_names(), vec!["Red", "Red.toar"]);

    let layer = engine.layer("Red.toar").unwrap();
    assert_eq!(layer.data.dim(), (2, 3));
    for &value in layer.data.iter() {
        assert_relative_eq!(value, 114.99704918928876, max_relative = 1e-12);
    }

    let metadata = layer.metadata.as_ref().expect("No metadata written");
    assert_eq!(metadata.title, "Red band (Top of Atmosphere Reflectance)");
    assert_eq!(metadata.units, "Unitless planetary reflectance");
    assert_eq!(
        metadata.description,
        "Top of Atmosphere Red band spectral Reflectance (unitless)"
    );
    assert_eq!(metadata.sources, vec![TAYLOR_CITATION, ESUN_CITATION]);
    assert!(metadata.history.contains("BAND_Esun=1556.5"));
    assert!(metadata.history.contains("ESD=1.0157675"));
    assert!(metadata.history.contains("cos("));
}

#[test]
fn test_radiance_only() {
    init_logging();
    let mut engine = scene_with(&["Red"], (2, 2), 100.0);
    let pipeline = CalibrationPipeline::new(CalibrationParams {
        radiance_only: true,
        ..Default::default()
    });

    let requests = [ConversionRequest::from_source("Red")];
    pipeline
        .run_with_context(&mut engine, &requests, &reference_scene())
        .expect("Calibration failed");

    let layer = engine.layer("Red.toar").unwrap();
    for &value in layer.data.iter() {
        assert_relative_eq!(value, 69336.14330874605, max_relative = 1e-14);
    }

    let metadata = layer.metadata.as_ref().unwrap();
    assert_eq!(metadata.units, "W / m2 / μm / ster");
    assert_eq!(
        metadata.description,
        "At-sensor Red band spectral Radiance (W/m2/μm/sr)"
    );
    assert_eq!(metadata.sources, vec![TAYLOR_CITATION]);
    assert!(metadata.history.ends_with("CalCoef=949; Bandwidth=65.8"));
    assert!(temporaries(&engine).is_empty());
}

#[test]
fn test_per_request_radiance_only() {
    let mut engine = scene_with(&["Red", "NIR"], (1, 1), 100.0);
    let pipeline = CalibrationPipeline::new(CalibrationParams::default());
    let requests = [
        ConversionRequest::from_source("Red"),
        ConversionRequest::from_source("NIR").radiance_only(true),
    ];

    pipeline
        .run_with_context(&mut engine, &requests, &reference_scene())
        .expect("Calibration failed");

    let red = engine.layer("Red.toar").unwrap();
    let nir = engine.layer("NIR.toar").unwrap();
    assert!(red.data[[0, 0]] < 1000.0);
    assert_relative_eq!(
        nir.data[[0, 0]],
        10000.0 * 100.0 / 843.0 * 95.4,
        max_relative = 1e-14
    );
}

#[test]
fn test_coefficient_before_update() {
    let mut engine = scene_with(&["Red"], (1, 1), 100.0);
    let pipeline = CalibrationPipeline::new(CalibrationParams {
        radiance_only: true,
        ..Default::default()
    });
    let acquisition = AcquisitionInputs {
        utc: Some("2000-08-10 09:58 GMT".to_string()),
        day_of_year: None,
        sun_elevation_deg: 60.0,
    };

    pipeline
        .run(&mut engine, &[ConversionRequest::from_source("Red")], &acquisition)
        .expect("Calibration failed");

    let value = engine.layer("Red.toar").unwrap().data[[0, 0]];
    assert_relative_eq!(value, 10000.0 * 100.0 / 840.0 * 65.8, max_relative = 1e-14);
}

#[test]
fn test_all_bands_distinct_outputs() {
    init_logging();
    let bands = ["Blue", "Green", "Red", "NIR", "Pan"];
    let mut engine = scene_with(&bands, (3, 3), 250.0);
    let pipeline = CalibrationPipeline::new(CalibrationParams {
        output_suffix: "reflectance".to_string(),
        ..Default::default()
    });
    let requests: Vec<_> = bands.iter().map(|b| ConversionRequest::from_source(b)).collect();
    let acquisition = AcquisitionInputs {
        utc: None,
        day_of_year: Some(166),
        sun_elevation_deg: 52.7888,
    };

    let outputs = pipeline
        .run(&mut engine, &requests, &acquisition)
        .expect("Calibration failed");

    assert_eq!(
        outputs,
        vec![
            "Blue.reflectance",
            "Green.reflectance",
            "Red.reflectance",
            "NIR.reflectance",
            "Pan.reflectance"
        ]
    );
    assert!(temporaries(&engine).is_empty());

    // Same DN, different calibration: every band must differ
    let values: Vec<f64> = outputs
        .iter()
        .map(|name| engine.layer(name).unwrap().data[[1, 1]])
        .collect();
    for (i, a) in values.iter().enumerate() {
        assert!(a.is_finite() && *a > 0.0);
        for b in &values[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_unknown_band_writes_nothing() {
    let mut engine = scene_with(&["Red", "Yellow"], (2, 2), 100.0);
    let pipeline = CalibrationPipeline::new(CalibrationParams::default());
    let requests = [
        ConversionRequest::from_source("Red"),
        ConversionRequest::from_source("Yellow"),
    ];

    let result = pipeline.run_with_context(&mut engine, &requests, &reference_scene());
    assert!(matches!(result, Err(ToarError::UnknownBand(name)) if name == "Yellow"));
    assert_eq!(engine.layer_names(), vec!["Red", "Yellow"]);
}

#[test]
fn test_missing_metadata_writes_nothing() {
    let mut engine = scene_with(&["Red"], (2, 2), 100.0);
    let pipeline = CalibrationPipeline::new(CalibrationParams::default());
    let acquisition = AcquisitionInputs {
        utc: None,
        day_of_year: None,
        sun_elevation_deg: 52.7888,
    };

    let requests = [ConversionRequest::from_source("Red")];
    let result = pipeline.run(&mut engine, &requests, &acquisition);
    assert!(matches!(result, Err(ToarError::MissingMetadata)));
    assert_eq!(engine.layer_names(), vec!["Red"]);
}

#[test]
fn test_missing_source_writes_nothing() {
    let mut engine = scene_with(&["Red"], (2, 2), 100.0);
    let pipeline = CalibrationPipeline::new(CalibrationParams::default());
    let requests = [
        ConversionRequest::from_source("Red"),
        ConversionRequest::from_source("Green"),
    ];

    let result = pipeline.run_with_context(&mut engine, &requests, &reference_scene());
    assert!(matches!(result, Err(ToarError::LayerNotFound(name)) if name == "Green"));
    assert_eq!(engine.layer_names(), vec!["Red"]);
}

#[test]
fn test_region_restored_after_run() {
    let original = Region::unit(10, 10);
    let mut engine = MemoryEngine::with_region(original.clone());
    engine.insert("Red", Array2::from_elem((2, 2), 100.0));
    engine.insert("Blue", Array2::from_elem((4, 3), 100.0));

    let pipeline = CalibrationPipeline::new(CalibrationParams::default());
    let requests = [
        ConversionRequest::from_source("Red"),
        ConversionRequest::from_source("Blue"),
    ];
    pipeline
        .run_with_context(&mut engine, &requests, &reference_scene())
        .expect("Calibration failed");

    // Each band is computed on its own grid
    assert_eq!(engine.layer("Red.toar").unwrap().data.dim(), (2, 2));
    assert_eq!(engine.layer("Blue.toar").unwrap().data.dim(), (4, 3));
    assert_eq!(engine.region(), Some(original));
}

#[test]
fn test_keep_region() {
    let mut engine = MemoryEngine::with_region(Region::unit(2, 2));
    engine.insert("Red", Array2::from_elem((2, 2), 100.0));
    engine.insert("NIR", Array2::from_elem((3, 3), 100.0));

    let pipeline = CalibrationPipeline::new(CalibrationParams {
        keep_region: true,
        ..Default::default()
    });

    // Red matches the region and is persisted; NIR does not and fails
    let requests = [
        ConversionRequest::from_source("Red"),
        ConversionRequest::from_source("NIR"),
    ];
    let result = pipeline.run_with_context(&mut engine, &requests, &reference_scene());
    assert!(matches!(result, Err(ToarError::RegionMismatch { .. })));

    assert!(engine.exists("Red.toar"));
    assert!(!engine.exists("NIR.toar"));
    assert!(temporaries(&engine).is_empty());
    assert_eq!(engine.region(), Some(Region::unit(2, 2)));
}

#[test]
fn test_qualified_source_name() {
    let mut engine = scene_with(&["Red"], (1, 1), 100.0);
    let pipeline = CalibrationPipeline::new(CalibrationParams::default());

    let outputs = pipeline
        .run_with_context(
            &mut engine,
            &[ConversionRequest::from_source("Red@PERMANENT")],
            &reference_scene(),
        )
        .expect("Calibration failed");

    assert_eq!(outputs, vec!["Red.toar"]);
    assert_eq!(engine.layer_names(), vec!["Red", "Red.toar"]);
}

#[test]
fn test_source_named_differently_from_band() {
    let mut engine = scene_with(&["ikonos_b3"], (1, 1), 100.0);
    let pipeline = CalibrationPipeline::new(CalibrationParams::default());

    let outputs = pipeline
        .run_with_context(
            &mut engine,
            &[ConversionRequest::new("red", "ikonos_b3")],
            &reference_scene(),
        )
        .expect("Calibration failed");

    assert_eq!(outputs, vec!["ikonos_b3.toar"]);
    let value = engine.layer("ikonos_b3.toar").unwrap().data[[0, 0]];
    assert_relative_eq!(value, 114.99704918928876, max_relative = 1e-12);
}

#[test]
fn test_existing_output() {
    let mut engine = scene_with(&["Red"], (1, 1), 100.0);
    engine.insert("Red.toar", Array2::from_elem((1, 1), -1.0));
    let requests = [ConversionRequest::from_source("Red")];

    let pipeline = CalibrationPipeline::new(CalibrationParams::default());
    let result = pipeline.run_with_context(&mut engine, &requests, &reference_scene());
    assert!(matches!(result, Err(ToarError::OutputExists(_))));
    assert_eq!(engine.layer("Red.toar").unwrap().data[[0, 0]], -1.0);

    let pipeline = CalibrationPipeline::new(CalibrationParams {
        overwrite: true,
        ..Default::default()
    });
    pipeline
        .run_with_context(&mut engine, &requests, &reference_scene())
        .expect("Calibration failed");
    assert_relative_eq!(
        engine.layer("Red.toar").unwrap().data[[0, 0]],
        114.99704918928876,
        max_relative = 1e-12
    );
}

#[test]
fn test_zero_and_null_cells() {
    let mut engine = MemoryEngine::new();
    let dn = Array2::from_shape_vec((1, 3), vec![0.0, f64::NAN, 100.0]).unwrap();
    engine.insert("Green", dn);

    let pipeline = CalibrationPipeline::new(CalibrationParams::default());
    let requests = [ConversionRequest::from_source("Green")];
    pipeline
        .run_with_context(&mut engine, &requests, &reference_scene())
        .expect("Calibration failed");

    let out = &engine.layer("Green.toar").unwrap().data;
    assert_eq!(out[[0, 0]], 0.0);
    assert!(out[[0, 1]].is_nan());
    assert!(out[[0, 2]] > 0.0);
}

#[test]
fn test_no_bands() {
    let mut engine = scene_with(&["Red"], (1, 1), 100.0);
    let pipeline = CalibrationPipeline::new(CalibrationParams::default());
    let outputs = pipeline
        .run_with_context(&mut engine, &[], &reference_scene())
        .expect("Empty run failed");
    assert!(outputs.is_empty());
    assert_eq!(engine.layer_names(), vec!["Red"]);
}

#[test]
fn test_output_never_replaces_another_input() {
    let mut engine = scene_with(&["Red", "Red.toar"], (1, 1), 100.0);
    let pipeline = CalibrationPipeline::new(CalibrationParams {
        overwrite: true,
        radiance_only: true,
        ..Default::default()
    });
    let requests = [
        ConversionRequest::from_source("Red"),
        ConversionRequest::new("NIR", "Red.toar"),
    ];

    let result = pipeline.run_with_context(&mut engine, &requests, &reference_scene());
    assert!(matches!(result, Err(ToarError::OutputCollision { .. })));

    // Nothing written, the second band's DN is untouched
    assert_eq!(engine.layer_names(), vec!["Red", "Red.toar"]);
    assert_eq!(engine.layer("Red.toar").unwrap().data[[0, 0]], 100.0);

    // Calibrated on its own, the same DN gives the plain NIR radiance
    let outputs = pipeline
        .run_with_context(&mut engine, &requests[1..], &reference_scene())
        .expect("Calibration failed");
    assert_eq!(outputs, vec!["Red.toar.toar"]);
    assert_relative_eq!(
        engine.layer("Red.toar.toar").unwrap().data[[0, 0]],
        10000.0 * 100.0 / 843.0 * 95.4,
        max_relative = 1e-14
    );
}
