pub mod montpellier;
pub mod overpass;
