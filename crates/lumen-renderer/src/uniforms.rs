//! GPU uniform layouts.
//!
//! Every struct here mirrors a WGSL struct byte for byte. Fields are packed
//! into `vec4`s so no implicit padding is needed on either side.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use lumen_core::{DirectionalLight, PointLight};

use crate::camera::Camera;
use crate::constants::{bindings, lights};
use crate::gpu::buffer::{DynamicUniformBuffer, UniformBuffer};
use crate::gpu::layouts;
use crate::resources::Material;

type Mat4Array = [[f32; 4]; 4];

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct VertexMatrices {
    pub view: Mat4Array,
    pub projection: Mat4Array,
    pub view_projection: Mat4Array,
}

impl VertexMatrices {
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            view: camera.view().to_cols_array_2d(),
            projection: camera.projection().to_cols_array_2d(),
            view_projection: camera.view_projection().to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FragmentMatrices {
    pub view: Mat4Array,
    pub projection: Mat4Array,
    pub inverse_view: Mat4Array,
    pub inverse_projection: Mat4Array,
}

impl FragmentMatrices {
    pub fn from_camera(camera: &Camera) -> Self {
        let view = camera.view();
        let projection = camera.projection();
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            inverse_view: view.inverse().to_cols_array_2d(),
            inverse_projection: projection.inverse().to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    /// xyz = position, w = near
    pub position: [f32; 4],
    /// far, ssao enabled, viewport width, viewport height
    pub params: [f32; 4],
    /// environment intensity, max prefilter mip, directional bias, point bias
    pub environment: [f32; 4],
}

/// Values packed into [`CameraUniform`] that do not come from the camera.
#[derive(Debug, Clone, Copy)]
pub struct FrameParams {
    pub ssao_enabled: bool,
    pub width: u32,
    pub height: u32,
    pub environment_intensity: f32,
    pub max_prefilter_mip: f32,
    pub directional_bias: f32,
    pub point_bias: f32,
}

impl CameraUniform {
    pub fn new(camera: &Camera, frame: &FrameParams) -> Self {
        Self {
            position: camera.position.extend(camera.near).to_array(),
            params: [
                camera.far,
                if frame.ssao_enabled { 1.0 } else { 0.0 },
                frame.width as f32,
                frame.height as f32,
            ],
            environment: [
                frame.environment_intensity,
                frame.max_prefilter_mip,
                frame.directional_bias,
                frame.point_bias,
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DirectionalLightData {
    pub light_space: Mat4Array,
    /// xyz = travel direction, w = shadow layer or -1
    pub direction: [f32; 4],
    /// rgb = color, a = intensity
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DirectionalLightsUniform {
    pub count: [u32; 4],
    pub lights: [DirectionalLightData; lights::MAX_DIRECTIONAL],
}

impl DirectionalLightsUniform {
    pub fn len(&self) -> usize {
        self.count[0] as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count[0] == 0
    }

    /// Appends a light. Returns false once the array is full.
    pub fn push(&mut self, light: &DirectionalLight, shadow_layer: Option<u32>) -> bool {
        let index = self.len();
        if index >= lights::MAX_DIRECTIONAL {
            return false;
        }
        let params = light.params();
        self.lights[index] = DirectionalLightData {
            light_space: light.light_space_matrix().to_cols_array_2d(),
            direction: light.direction().extend(layer_value(shadow_layer)).to_array(),
            color: params.color.extend(params.intensity).to_array(),
        };
        self.count[0] += 1;
        true
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PointLightData {
    /// xyz = position, w = influence radius
    pub position: [f32; 4],
    /// rgb = color, a = intensity
    pub color: [f32; 4],
    /// constant, linear, quadratic, far plane
    pub attenuation: [f32; 4],
    /// x = shadow cube index or -1, y = near plane
    pub shadow: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PointLightsUniform {
    pub count: [u32; 4],
    pub lights: [PointLightData; lights::MAX_POINT],
}

impl PointLightsUniform {
    pub fn len(&self) -> usize {
        self.count[0] as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count[0] == 0
    }

    /// Appends a light. Returns false once the array is full.
    pub fn push(&mut self, light: &PointLight, shadow_cube: Option<u32>) -> bool {
        let index = self.len();
        if index >= lights::MAX_POINT {
            return false;
        }
        let params = light.params();
        let attenuation = light.attenuation();
        self.lights[index] = PointLightData {
            // infinite radius is not representable in every backend
            position: light.position().extend(light.radius().min(f32::MAX)).to_array(),
            color: params.color.extend(params.intensity).to_array(),
            attenuation: [
                attenuation.constant,
                attenuation.linear,
                attenuation.quadratic,
                params.far,
            ],
            shadow: [layer_value(shadow_cube), params.near, 0.0, 0.0],
        };
        self.count[0] += 1;
        true
    }
}

fn layer_value(layer: Option<u32>) -> f32 {
    layer.map(|l| l as f32).unwrap_or(lights::NO_SHADOW as f32)
}

/// Per-draw data, addressed with a dynamic offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: Mat4Array,
    /// Inverse transpose of the model matrix
    pub normal: Mat4Array,
    /// rgb = albedo, a = specular
    pub albedo: [f32; 4],
    /// metallic, roughness, ambient occlusion, emissive
    pub material: [f32; 4],
}

impl ObjectUniform {
    pub fn new(world: Mat4, material: &Material) -> Self {
        Self {
            model: world.to_cols_array_2d(),
            normal: normal_matrix(world).to_cols_array_2d(),
            albedo: material.albedo.extend(material.specular).to_array(),
            material: [material.metallic, material.roughness, material.ao, material.emissive],
        }
    }
}

/// Inverse transpose, falling back to the model matrix when singular.
pub fn normal_matrix(world: Mat4) -> Mat4 {
    if world.determinant().abs() < f32::EPSILON {
        world
    } else {
        world.inverse().transpose()
    }
}

/// One shadow layer (or cube face), addressed with a dynamic offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadowPassUniform {
    pub light_space: Mat4Array,
    /// xyz = light position, w = far plane
    pub light_position: [f32; 4],
    /// x = near plane
    pub params: [f32; 4],
}

impl ShadowPassUniform {
    pub fn new(light_space: Mat4, position: Vec3, near: f32, far: f32) -> Self {
        Self {
            light_space: light_space.to_cols_array_2d(),
            light_position: position.extend(far).to_array(),
            params: [near, 0.0, 0.0, 0.0],
        }
    }
}

/// One cube face of an environment bake.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FacePassUniform {
    pub face: u32,
    pub roughness: f32,
    /// Edge length of the source cube
    pub source_size: f32,
    pub sample_count: u32,
}

/// SSAO kernel and parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SsaoUniform {
    pub samples: [[f32; 4]; 64],
    /// kernel size, radius, bias, noise size
    pub params: [f32; 4],
}

/// The five per-frame uniform buffers and their bind group (group 0).
pub struct FrameUniforms {
    vertex_matrices: UniformBuffer<VertexMatrices>,
    fragment_matrices: UniformBuffer<FragmentMatrices>,
    camera: UniformBuffer<CameraUniform>,
    directional_lights: UniformBuffer<DirectionalLightsUniform>,
    point_lights: UniformBuffer<PointLightsUniform>,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

impl FrameUniforms {
    pub fn new(device: &wgpu::Device) -> Self {
        let vertex_matrices = UniformBuffer::new(device, "Vertex Matrices", &VertexMatrices::zeroed());
        let fragment_matrices = UniformBuffer::new(device, "Fragment Matrices", &FragmentMatrices::zeroed());
        let camera = UniformBuffer::new(device, "Camera Uniform", &CameraUniform::zeroed());
        let directional_lights =
            UniformBuffer::new(device, "Directional Lights", &DirectionalLightsUniform::zeroed());
        let point_lights = UniformBuffer::new(device, "Point Lights", &PointLightsUniform::zeroed());

        let stages = wgpu::ShaderStages::VERTEX_FRAGMENT;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[
                layouts::uniform_entry(
                    bindings::VERTEX_MATRICES,
                    stages,
                    false,
                    UniformBuffer::<VertexMatrices>::min_binding_size(),
                ),
                layouts::uniform_entry(
                    bindings::FRAGMENT_MATRICES,
                    stages,
                    false,
                    UniformBuffer::<FragmentMatrices>::min_binding_size(),
                ),
                layouts::uniform_entry(
                    bindings::CAMERA,
                    stages,
                    false,
                    UniformBuffer::<CameraUniform>::min_binding_size(),
                ),
                layouts::uniform_entry(
                    bindings::DIRECTIONAL_LIGHTS,
                    stages,
                    false,
                    UniformBuffer::<DirectionalLightsUniform>::min_binding_size(),
                ),
                layouts::uniform_entry(
                    bindings::POINT_LIGHTS,
                    stages,
                    false,
                    UniformBuffer::<PointLightsUniform>::min_binding_size(),
                ),
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: bindings::VERTEX_MATRICES,
                    resource: vertex_matrices.binding(),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::FRAGMENT_MATRICES,
                    resource: fragment_matrices.binding(),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::CAMERA,
                    resource: camera.binding(),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::DIRECTIONAL_LIGHTS,
                    resource: directional_lights.binding(),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::POINT_LIGHTS,
                    resource: point_lights.binding(),
                },
            ],
        });

        Self {
            vertex_matrices,
            fragment_matrices,
            camera,
            directional_lights,
            point_lights,
            layout,
            bind_group,
        }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Writes camera-derived matrices and frame parameters.
    pub fn write_camera(&self, queue: &wgpu::Queue, camera: &Camera, frame: &FrameParams) {
        self.vertex_matrices.write(queue, &VertexMatrices::from_camera(camera));
        self.fragment_matrices.write(queue, &FragmentMatrices::from_camera(camera));
        self.camera.write(queue, &CameraUniform::new(camera, frame));
    }

    pub fn write_lights(
        &self,
        queue: &wgpu::Queue,
        directional: &DirectionalLightsUniform,
        point: &PointLightsUniform,
    ) {
        self.directional_lights.write(queue, directional);
        self.point_lights.write(queue, point);
    }
}

/// Per-draw object uniforms for every pass of a frame (group 1).
pub struct ObjectUniforms {
    buffer: DynamicUniformBuffer<ObjectUniform>,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

impl ObjectUniforms {
    pub fn new(device: &wgpu::Device, alignment: u64) -> Self {
        let buffer = DynamicUniformBuffer::new(device, "Object Uniforms", alignment, 64);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Object Bind Group Layout"),
            entries: &[layouts::uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX_FRAGMENT,
                true,
                DynamicUniformBuffer::<ObjectUniform>::min_binding_size(),
            )],
        });
        let bind_group = Self::create_bind_group(device, &layout, &buffer);
        Self {
            buffer,
            layout,
            bind_group,
        }
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &DynamicUniformBuffer<ObjectUniform>,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Object Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.binding(),
            }],
        })
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Stages one draw and returns its dynamic offset.
    pub fn push(&mut self, world: Mat4, material: &Material) -> u32 {
        self.buffer.push(&ObjectUniform::new(world, material))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Uploads staged draws, recreating the bind group if the buffer grew.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.buffer.upload(device, queue) {
            self.bind_group = Self::create_bind_group(device, &self.layout, &self.buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem::{offset_of, size_of};

    use lumen_core::{Attenuation, LightParams};

    use super::*;

    #[test]
    fn test_sizes_match_wgsl() {
        assert_eq!(size_of::<VertexMatrices>(), 192);
        assert_eq!(size_of::<FragmentMatrices>(), 256);
        assert_eq!(size_of::<CameraUniform>(), 48);
        assert_eq!(size_of::<DirectionalLightData>(), 96);
        assert_eq!(size_of::<DirectionalLightsUniform>(), 16 + 8 * 96);
        assert_eq!(size_of::<PointLightData>(), 64);
        assert_eq!(size_of::<PointLightsUniform>(), 16 + 64 * 64);
        assert_eq!(size_of::<ObjectUniform>(), 160);
        assert_eq!(size_of::<ShadowPassUniform>(), 96);
        assert_eq!(size_of::<FacePassUniform>(), 16);
        assert_eq!(size_of::<SsaoUniform>(), 1040);
        assert_eq!(offset_of!(DirectionalLightsUniform, lights), 16);
        assert_eq!(offset_of!(SsaoUniform, params), 1024);
    }

    #[test]
    fn test_directional_push_marks_layer() {
        let mut uniform = DirectionalLightsUniform::zeroed();
        let light = DirectionalLight::new(Vec3::NEG_Y);
        assert!(uniform.push(&light, Some(3)));
        assert!(uniform.push(&light, None));
        assert_eq!(uniform.len(), 2);
        assert_eq!(uniform.lights[0].direction[3], 3.0);
        assert_eq!(uniform.lights[1].direction[3], -1.0);
        assert_eq!(uniform.lights[0].direction[1], -1.0);
    }

    #[test]
    fn test_directional_push_stops_when_full() {
        let mut uniform = DirectionalLightsUniform::zeroed();
        let light = DirectionalLight::default();
        for _ in 0..lights::MAX_DIRECTIONAL {
            assert!(uniform.push(&light, None));
        }
        assert!(!uniform.push(&light, None));
        assert_eq!(uniform.len(), lights::MAX_DIRECTIONAL);
    }

    #[test]
    fn test_point_push_packs_attenuation() {
        let mut uniform = PointLightsUniform::zeroed();
        let mut light = PointLight::new()
            .with_params(LightParams {
                color: Vec3::new(1.0, 0.5, 0.25),
                intensity: 2.0,
                ..Default::default()
            })
            .with_attenuation(Attenuation::new(1.0, 0.09, 0.032));
        light.set_position(Vec3::new(1.0, 2.0, 3.0));

        assert!(uniform.push(&light, Some(0)));
        let data = uniform.lights[0];
        assert_eq!(&data.position[..3], &[1.0, 2.0, 3.0]);
        assert!(data.position[3].is_finite() && data.position[3] > 0.0);
        assert_eq!(data.color, [1.0, 0.5, 0.25, 2.0]);
        assert_eq!(&data.attenuation[..3], &[1.0, 0.09, 0.032]);
        assert_eq!(data.shadow[0], 0.0);
    }

    #[test]
    fn test_constant_attenuation_radius_is_finite() {
        let mut uniform = PointLightsUniform::zeroed();
        let light = PointLight::new().with_attenuation(Attenuation::new(1.0, 0.0, 0.0));
        uniform.push(&light, None);
        assert!(uniform.lights[0].position[3].is_finite());
        assert_eq!(uniform.lights[0].shadow[0], -1.0);
    }

    #[test]
    fn test_normal_matrix_handles_scale() {
        let world = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let normal = normal_matrix(world);
        let n = normal.transform_vector3(Vec3::X);
        assert!((n.x - 0.5).abs() < 1e-6);
        assert_eq!(normal_matrix(Mat4::ZERO), Mat4::ZERO);
    }
}
