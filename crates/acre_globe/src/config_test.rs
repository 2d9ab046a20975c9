use super::*;

#[test]
fn test_presets_are_valid() {
  for config in [GlobeConfig::SMALL, GlobeConfig::MEDIUM, GlobeConfig::LARGE] {
    assert_eq!(config.validate(), Ok(()), "{config:?}");
  }
  assert_eq!(GlobeConfig::MEDIUM.spec(), GeoSpec::new(9, 15));
}

#[test]
fn test_sector_divisions_must_be_multiple_of_three() {
  for n in [0, 1, 4, 10] {
    let err = GlobeConfig::new(1, n).validate().unwrap_err();
    assert!(matches!(err, BuildError::Config(_)), "n = {n}");
  }
  assert!(GlobeConfig::new(1, 6).validate().is_ok());
}

#[test]
fn test_zone_divisions_range() {
  let base = GlobeConfig::new(1, 3);
  assert!(base.clone().with_zone_divisions(1).validate().is_err());
  assert!(base.clone().with_zone_divisions(65).validate().is_err());
  assert!(base.clone().with_zone_divisions(2).validate().is_ok());
  assert!(base.with_zone_divisions(64).validate().is_ok());
}

#[test]
fn test_global_divisions_and_radius() {
  assert!(GlobeConfig::new(0, 3).validate().is_err());
  assert!(GlobeConfig::new(1, 3).with_radius(-5.0).validate().is_err());
  assert!(GlobeConfig::new(1, 3).with_radius(f64::NAN).validate().is_err());
}

#[test]
fn test_working_radius() {
  let config = GlobeConfig::new(1, 3);
  assert_eq!(config.working_radius(), config.spec().approximate_radius());
  assert_eq!(config.with_radius(6_371_000.0).working_radius(), 6_371_000.0);
}

#[test]
fn test_large_preset_skips_assertions() {
  assert!(!GlobeConfig::LARGE.assertions);
  assert!(GlobeConfig::SMALL.assertions && GlobeConfig::MEDIUM.assertions);
  assert!(GlobeConfig::new(30, 30).assertions);
}

#[test]
fn test_acres_must_fit_pack_ids() {
  // Largest accepted subdivision, yet ~9.4e14 acres.
  let err = GlobeConfig::new(4096, 4095).validate().unwrap_err();
  assert!(matches!(&err, BuildError::Config(msg) if msg.contains("pack id")), "{err}");
}

#[test]
fn test_lattice_spacing_must_clear_dedup_tolerance() {
  // Fits pack ids and vertex ids, but neighbors are ~9e-5 apart.
  let config = GlobeConfig::new(400, 30);
  assert!(config.spec().acres() <= u32::MAX as u64);
  assert!(VertexIdLayout::new(&config.spec(), config.zone_divisions).is_ok());
  let err = config.validate().unwrap_err();
  assert!(matches!(&err, BuildError::Config(msg) if msg.contains("spacing")), "{err}");

  assert!(GlobeConfig::new(100, 30).validate().is_err());
  assert!(GlobeConfig::new(90, 30).validate().is_ok());
}
