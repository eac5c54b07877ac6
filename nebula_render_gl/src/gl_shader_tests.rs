use nebula_render::nebula::render::ValueType;

use super::*;

#[test]
fn test_reflected_types() {
    assert_eq!(value_type_from_gl(glow::FLOAT_VEC3), Some(ValueType::Vec3));
    assert_eq!(value_type_from_gl(glow::FLOAT_MAT4), Some(ValueType::Mat4));
    assert_eq!(value_type_from_gl(glow::SAMPLER_2D), Some(ValueType::Sampler2d));
    assert_eq!(value_type_from_gl(glow::INT), Some(ValueType::Int32));
    // Not part of the API surface
    assert_eq!(value_type_from_gl(glow::FLOAT_MAT3), None);
    assert_eq!(value_type_from_gl(glow::SAMPLER_CUBE), None);
}

#[test]
fn test_reflected_names() {
    assert_eq!(reflected_name("u_color"), Some("u_color"));
    assert_eq!(reflected_name("u_lights[0]"), Some("u_lights"));
    assert_eq!(reflected_name("gl_VertexID"), None);
}
