use approx::{assert_abs_diff_eq, assert_relative_eq};
use ikonos_toar::core::acquisition::{earth_sun_distance, solar_zenith_angle};
use ikonos_toar::core::radiometry::{radiance_expression, to_radiance, to_reflectance};
use ikonos_toar::core::{BandParameterTable, Expr, CALIBRATION_UPDATE_DATE};
use ikonos_toar::types::{RasterGrid, ToarResult};
use ndarray::Array2;

#[test]
fn test_radiance_properties_for_every_band() {
    let table = BandParameterTable::ikonos();
    for params in table.bands() {
        let band = table
            .lookup(params.name, CALIBRATION_UPDATE_DATE)
            .expect("Band lookup failed");

        assert_eq!(to_radiance(0.0, band.coefficient, band.bandwidth).unwrap(), 0.0);

        let one = to_radiance(1.0, band.coefficient, band.bandwidth).unwrap();
        for dn in [1.0, 17.0, 255.0, 2047.0] {
            let radiance = to_radiance(dn, band.coefficient, band.bandwidth).unwrap();
            assert_relative_eq!(radiance, dn * one, max_relative = 1e-12);
        }
    }
}

#[test]
fn test_reflectance_properties_for_every_band() {
    let table = BandParameterTable::ikonos();
    for params in table.bands() {
        let radiance = 5000.0;

        // Monotonically non-increasing over the zenith range
        let mut previous = f64::INFINITY;
        for sea in (1..90).rev() {
            let sza = solar_zenith_angle(sea as f64);
            let rho = to_reflectance(radiance, 1.0, params.esun, sza).unwrap();
            assert!(rho <= previous, "{} at SZA {}", params.name, sza);
            previous = rho;
        }

        // Scales with the square of the Earth-Sun distance
        let near = to_reflectance(radiance, 0.98, params.esun, 30.0).unwrap();
        let far = to_reflectance(radiance, 1.02, params.esun, 30.0).unwrap();
        assert_relative_eq!(far / near, (1.02f64 / 0.98).powi(2), max_relative = 1e-12);
    }
}

#[test]
fn test_zenith_at_horizon_gives_zero() {
    let rho = to_reflectance(5000.0, 1.0, 1556.5, solar_zenith_angle(0.0)).unwrap();
    assert_abs_diff_eq!(rho, 0.0, epsilon = 1e-12);
}

#[test]
fn test_grid_matches_scalar_chain() {
    let table = BandParameterTable::ikonos();
    let band = table.lookup("NIR", CALIBRATION_UPDATE_DATE).unwrap();
    let dn = Array2::from_shape_fn((4, 4), |(r, c)| (r * 97 + c * 13) as f64);

    let resolve = |_: &str| -> ToarResult<&RasterGrid> { Ok(&dn) };
    let radiance = radiance_expression("NIR", &band)
        .evaluate(dn.dim(), &resolve)
        .expect("Evaluation failed");

    for ((r, c), &value) in radiance.indexed_iter() {
        let expected = to_radiance(dn[[r, c]], band.coefficient, band.bandwidth).unwrap();
        assert_eq!(value.to_bits(), expected.to_bits());
    }
}

#[test]
fn test_earth_sun_distance_seasonality() {
    let january = earth_sun_distance(4, 365.0);
    let july = earth_sun_distance(186, 365.0);
    let october = earth_sun_distance(280, 365.0);
    assert!(january < october && october < july);
}

#[test]
fn test_expression_rendering_for_reflectance() {
    let expr = Expr::constant(std::f64::consts::PI)
        .mul(Expr::raster("tmp.1.Red.radiance"))
        .mul(Expr::constant(1.0157675).pow(Expr::constant(2.0)))
        .div(Expr::constant(1556.5))
        .mul(Expr::constant(37.2112).cos());
    assert_eq!(
        expr.to_string(),
        "3.141592653589793 * tmp.1.Red.radiance * 1.0157675 ^ 2 / 1556.5 * cos(37.2112)"
    );
}
