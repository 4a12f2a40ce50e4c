//! 弹簧骨骼 - 参考 UniVRM VRMSpringBone 实现
//!
//! 每个弹簧骨骼追踪一个虚拟尾端点：
//! 1. Verlet 积分推进尾端（惯性 + 刚度 + 重力）
//! 2. 长度约束，保证尾端与骨骼原点距离恒定
//! 3. 逐个碰撞球推出，每次推出后重新施加长度约束
//! 4. 将尾端方向换算回骨骼本地旋转
//!
//! 尾端历史位置可以存储在中心节点的本地空间中（CenterSpace），
//! 使模拟不受根节点瞬移的影响。

use glam::{Mat4, Quat, Vec3};

use crate::{VrmError, Result};
use crate::skeleton::Hierarchy;

use super::rig::BoneGroupConfig;
use super::sphere_collider::SphereColliderGroup;

// ============================================================================
// 组参数
// ============================================================================

/// 弹簧骨骼组共享参数
#[derive(Clone, Debug)]
pub struct SpringParams {
    /// 刚度
    pub stiffness_force: f32,
    /// 重力强度
    pub gravity_power: f32,
    /// 重力方向（单位向量，或零向量表示无重力）
    pub gravity_dir: Vec3,
    /// 阻力 [0, 1]
    pub drag_force: f32,
    /// 接触半径
    pub hit_radius: f32,
    /// 中心节点
    pub center: Option<usize>,
}

impl Default for SpringParams {
    fn default() -> Self {
        Self {
            stiffness_force: 1.0,
            gravity_power: 1.0,
            gravity_dir: Vec3::NEG_Y,
            drag_force: 0.4,
            hit_radius: 0.02,
            center: None,
        }
    }
}

impl SpringParams {
    /// 从组配置创建
    ///
    /// 重力方向在此归一化，阻力钳制到 [0, 1]；接触半径非法时构建失败。
    pub fn from_config(group: usize, config: &BoneGroupConfig, center: Option<usize>) -> Result<Self> {
        if !config.hit_radius.is_finite() || config.hit_radius < 0.0 {
            return Err(VrmError::InvalidHitRadius { group, radius: config.hit_radius });
        }

        let drag_force = config.drag_force.clamp(0.0, 1.0);
        if drag_force != config.drag_force {
            log::warn!(
                "[SpringBone] 组 {} 阻力 {} 超出 [0, 1]，已钳制为 {}",
                group, config.drag_force, drag_force
            );
        }

        let gravity_dir = config.gravity_dir.normalize_or_zero();
        if gravity_dir == Vec3::ZERO && config.gravity_power != 0.0 {
            log::warn!("[SpringBone] 组 {} 重力方向为零向量，重力失效", group);
        }

        Ok(Self {
            stiffness_force: config.stiffness,
            gravity_power: config.gravity_power,
            gravity_dir,
            drag_force,
            hit_radius: config.hit_radius,
            center,
        })
    }
}

// ============================================================================
// 中心空间
// ============================================================================

/// 尾端历史位置的存储空间
///
/// 无中心节点时两个方向的转换都是恒等变换。
#[derive(Clone, Copy, Debug)]
pub(crate) enum CenterSpace {
    World,
    Node { to_world: Mat4, to_local: Mat4 },
}

impl CenterSpace {
    /// 按中心节点的当前世界变换捕获
    pub(crate) fn capture<H: Hierarchy + ?Sized>(skeleton: &H, center: Option<usize>) -> Self {
        match center {
            Some(index) => {
                let to_world = skeleton.world_matrix(index);
                Self::Node { to_world, to_local: to_world.inverse() }
            }
            None => Self::World,
        }
    }

    #[inline]
    pub(crate) fn to_local(&self, point: Vec3) -> Vec3 {
        match self {
            Self::World => point,
            Self::Node { to_local, .. } => to_local.transform_point3(point),
        }
    }

    #[inline]
    pub(crate) fn to_world(&self, point: Vec3) -> Vec3 {
        match self {
            Self::World => point,
            Self::Node { to_world, .. } => to_world.transform_point3(point),
        }
    }
}

/// 将候选点拉回到距 `origin` 恰好 `length` 的位置
///
/// 候选点与原点重合时方向未定义，本帧跳过修正。
#[inline]
fn constrain_length(origin: Vec3, candidate: Vec3, length: f32) -> Vec3 {
    match (candidate - origin).try_normalize() {
        Some(direction) => origin + direction * length,
        None => {
            log::trace!("[SpringBone] 尾端与骨骼原点重合，跳过长度修正");
            candidate
        }
    }
}

// ============================================================================
// 弹簧骨骼
// ============================================================================

/// 单个弹簧骨骼
#[derive(Clone, Debug)]
pub struct SpringBone {
    /// 驱动的节点
    bone: usize,
    /// 构建时捕获的静止本地旋转
    initial_rotation: Quat,
    /// 尾端延伸方向（骨骼本地空间，单位向量）
    bone_axis: Vec3,
    /// 尾端长度
    length: f32,
    /// 当前尾端（世界空间或中心节点本地空间）
    current_tail: Vec3,
    /// 上一帧尾端
    prev_tail: Vec3,
    /// 尾端是否已从骨骼姿态初始化
    initialized: bool,
}

impl SpringBone {
    /// 创建弹簧骨骼，捕获当前本地旋转作为静止姿态
    pub fn new<H: Hierarchy + ?Sized>(skeleton: &H, bone: usize) -> Result<Self> {
        let tail = skeleton.tail_of(bone).ok_or(VrmError::MissingTail { node: bone })?;
        if !tail.length.is_finite() || tail.length <= 0.0 {
            return Err(VrmError::InvalidBoneLength { node: bone, length: tail.length });
        }
        let bone_axis = tail
            .axis
            .try_normalize()
            .ok_or(VrmError::InvalidBoneLength { node: bone, length: tail.length })?;

        Ok(Self {
            bone,
            initial_rotation: skeleton.local_rotation(bone),
            bone_axis,
            length: tail.length,
            current_tail: Vec3::ZERO,
            prev_tail: Vec3::ZERO,
            initialized: false,
        })
    }

    #[inline]
    pub fn bone(&self) -> usize {
        self.bone
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// 当前尾端（存储空间中的原始值）
    #[inline]
    pub fn tail(&self) -> Vec3 {
        self.current_tail
    }

    /// 恢复静止姿态，下一次 update 重新从骨骼姿态初始化尾端
    pub fn reset<H: Hierarchy + ?Sized>(&mut self, skeleton: &mut H) {
        skeleton.set_local_rotation(self.bone, self.initial_rotation);
        self.initialized = false;
    }

    /// 推进一帧
    ///
    /// `delta <= 0` 时不做任何事。
    pub fn update<H: Hierarchy + ?Sized>(
        &mut self,
        skeleton: &mut H,
        params: &SpringParams,
        collider_groups: &[SphereColliderGroup],
        collider_indices: &[usize],
        delta: f32,
    ) {
        if !(delta > 0.0) {
            return;
        }

        let center = CenterSpace::capture(&*skeleton, params.center);

        if !self.initialized {
            let tail = skeleton.local_to_world(self.bone, self.bone_axis * self.length);
            self.current_tail = center.to_local(tail);
            self.prev_tail = self.current_tail;
            self.initialized = true;
        }

        let prev_tail = center.to_world(self.prev_tail);
        let current_tail = center.to_world(self.current_tail);

        let origin = skeleton.world_position(self.bone);
        let parent_rotation = skeleton.parent_world_rotation(self.bone);
        // 父节点当前朝向下的静止姿态
        let rest_rotation = parent_rotation * self.initial_rotation;

        // Verlet 积分：惯性 + 刚度 + 重力
        let next_tail = current_tail
            + (current_tail - prev_tail) * (1.0 - params.drag_force)
            + rest_rotation * self.bone_axis * (delta * params.stiffness_force)
            + params.gravity_dir * (delta * params.gravity_power);

        let next_tail = constrain_length(origin, next_tail, self.length);
        let next_tail = self.resolve_collisions(
            origin,
            next_tail,
            params.hit_radius,
            collider_groups,
            collider_indices,
        );

        self.prev_tail = self.current_tail;
        self.current_tail = center.to_local(next_tail);

        match self.tail_to_rotation(parent_rotation, rest_rotation, origin, next_tail) {
            Some(rotation) => skeleton.set_local_rotation(self.bone, rotation),
            None => log::trace!("[SpringBone] 节点 {} 尾端方向退化，保持旋转", self.bone),
        }
    }

    /// 按碰撞组顺序、组内顺序依次推出尾端
    ///
    /// 每次推出都基于上一个碰撞球修正后的位置，结果依赖顺序。
    fn resolve_collisions(
        &self,
        origin: Vec3,
        mut tail: Vec3,
        hit_radius: f32,
        collider_groups: &[SphereColliderGroup],
        collider_indices: &[usize],
    ) -> Vec3 {
        let colliders = collider_indices
            .iter()
            .filter_map(|&i| collider_groups.get(i))
            .flat_map(|group| group.colliders());

        for collider in colliders {
            let r = hit_radius + collider.radius;
            let offset = tail - collider.world_position;
            if offset.length_squared() > r * r {
                continue;
            }
            match offset.try_normalize() {
                Some(direction) => {
                    let pushed = collider.world_position + direction * r;
                    tail = constrain_length(origin, pushed, self.length);
                }
                None => log::trace!("[SpringBone] 尾端位于碰撞球心，跳过推出"),
            }
        }
        tail
    }

    /// 尾端世界位置 → 骨骼本地旋转
    ///
    /// local = parent⁻¹ · arc(v_from, v_to) · parent · initial，
    /// 尾端位于静止方向时结果即为 initial。
    fn tail_to_rotation(
        &self,
        parent_rotation: Quat,
        rest_rotation: Quat,
        origin: Vec3,
        tail: Vec3,
    ) -> Option<Quat> {
        let v_from = (rest_rotation * self.bone_axis).try_normalize()?;
        let v_to = (tail - origin).try_normalize()?;
        let arc = Quat::from_rotation_arc(v_from, v_to);
        Some((parent_rotation.inverse() * arc * rest_rotation).normalize())
    }
}

// ============================================================================
// 弹簧骨骼组
// ============================================================================

/// 弹簧骨骼组：共享参数与碰撞组列表
#[derive(Clone, Debug)]
pub struct SpringBoneGroup {
    /// 共享参数
    pub params: SpringParams,
    /// 参与碰撞的碰撞组索引（指向控制器持有的碰撞组）
    collider_groups: Vec<usize>,
    /// 弹簧骨骼（构建顺序即更新顺序）
    springs: Vec<SpringBone>,
}

impl SpringBoneGroup {
    pub fn new(params: SpringParams, collider_groups: Vec<usize>) -> Self {
        Self {
            params,
            collider_groups,
            springs: Vec::new(),
        }
    }

    /// 为节点创建弹簧骨骼
    pub fn create_spring_bone<H: Hierarchy + ?Sized>(&mut self, skeleton: &H, bone: usize) -> Result<()> {
        self.springs.push(SpringBone::new(skeleton, bone)?);
        Ok(())
    }

    pub fn reset<H: Hierarchy + ?Sized>(&mut self, skeleton: &mut H) {
        for spring in &mut self.springs {
            spring.reset(skeleton);
        }
    }

    pub fn update<H: Hierarchy + ?Sized>(
        &mut self,
        skeleton: &mut H,
        collider_groups: &[SphereColliderGroup],
        delta: f32,
    ) {
        for spring in &mut self.springs {
            spring.update(skeleton, &self.params, collider_groups, &self.collider_groups, delta);
        }
    }

    #[inline]
    pub fn spring_bones(&self) -> &[SpringBone] {
        &self.springs
    }

    #[inline]
    pub fn collider_groups(&self) -> &[usize] {
        &self.collider_groups
    }
}
