//! Unit tests for shader variables and uniform validation

use crate::error::Error;
use crate::renderer::shader::*;

fn sample_set() -> ShaderVariableSet {
    let mut set = ShaderVariableSet::new();
    set.push("a_position", VariableKind::Attribute, ValueType::Vec3, 0);
    set.push("u_mvp", VariableKind::Uniform, ValueType::Mat4, 0);
    set.push("u_tint", VariableKind::Uniform, ValueType::Vec4, 64);
    set.push("u_albedo", VariableKind::Sampler, ValueType::Sampler2d, 1);
    set
}

#[test]
fn test_variable_lookup_by_name_and_index() {
    let set = sample_set();
    assert_eq!(set.len(), 4);
    let tint = set.by_name("u_tint").unwrap();
    assert_eq!(tint.index, 2);
    assert_eq!(tint.location, 64);
    assert_eq!(set.get(2).unwrap().name, "u_tint");
    assert!(set.by_name("u_missing").is_none());
}

#[test]
fn test_duplicate_name_keeps_first_definition() {
    let mut set = sample_set();
    let index = set.push("u_mvp", VariableKind::Uniform, ValueType::Mat4, 99);
    assert_eq!(index, 1);
    assert_eq!(set.len(), 4);
    assert_eq!(set.by_name("u_mvp").unwrap().location, 0);
}

#[test]
fn test_uniform_write_rejects_attribute() {
    let set = sample_set();
    let result = set.resolve_uniform(0, &UniformValue::Vec3([0.0; 3]));
    assert!(matches!(result, Err(Error::InvalidArgument(msg)) if msg.contains("attribute")));
}

#[test]
fn test_uniform_write_rejects_type_mismatch() {
    let set = sample_set();
    assert!(set.resolve_uniform(1, &UniformValue::Vec4([0.0; 4])).is_err());
    assert!(set.resolve_uniform(1, &UniformValue::from(glam::Mat4::IDENTITY)).is_ok());
    assert!(set.resolve_uniform(3, &UniformValue::Sampler2d(0)).is_ok());
    assert!(set.resolve_uniform(3, &UniformValue::Int32(0)).is_err());
}

#[test]
fn test_uniform_write_rejects_unknown_index() {
    let set = sample_set();
    assert!(set.resolve_uniform(42, &UniformValue::Float32(1.0)).is_err());
}

#[test]
fn test_uniform_value_from_glam() {
    assert_eq!(UniformValue::from(glam::Vec2::new(1.0, 2.0)), UniformValue::Vec2([1.0, 2.0]));
    assert_eq!(UniformValue::from(glam::Vec3::ONE).value_type(), ValueType::Vec3);
    let mat = glam::Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
    match UniformValue::from(mat) {
        UniformValue::Mat4(cols) => assert_eq!(&cols[12..15], &[1.0, 2.0, 3.0]),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_shader_pair_validation() {
    assert!(validate_shader_pair(ShaderType::Vertex, ShaderType::Fragment).is_ok());
    assert!(validate_shader_pair(ShaderType::Fragment, ShaderType::Fragment).is_err());
    assert!(validate_shader_pair(ShaderType::Vertex, ShaderType::Vertex).is_err());
}
