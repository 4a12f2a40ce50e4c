//! 骨骼系统 - 参考 nphysics Multibody 设计
//!
//! 核心设计思想：
//! - Hierarchy: 物理模块对骨骼层次的全部需求（只读查询 + 写本地旋转）
//! - BoneLink: 类似 nphysics MultibodyLink，表示单个节点
//! - BoneSet: 类似 nphysics Multibody，Hierarchy 的参考实现

mod bone_link;
mod bone_set;

pub use bone_link::{BoneLink, NodeFlags};
pub use bone_set::BoneSet;

use glam::{Vec3, Quat, Mat4};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 节点本地变换（相对父节点）
#[derive(Clone, Copy, Debug)]
pub struct NodeTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl NodeTransform {
    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// 弹簧骨骼尾端元数据
///
/// 尾端是骨骼本地空间中沿 `axis` 延伸 `length` 的虚拟点。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTail {
    /// 本地延伸方向
    pub axis: Vec3,
    /// 延伸长度
    pub length: f32,
}

impl BoneTail {
    pub fn new(axis: Vec3, length: f32) -> Self {
        Self { axis, length }
    }
}

// ============================================================================
// 骨骼层次 trait
// ============================================================================

/// 骨骼层次结构
///
/// 物理模块只通过该 trait 访问骨骼：读取层次关系和世界变换，写入本地旋转。
/// `set_local_rotation` 必须同步刷新该节点及其所有后代的世界变换，
/// 否则同一帧中后续的子骨骼会读到过期的父节点姿态。
pub trait Hierarchy {
    /// 节点数量
    fn node_count(&self) -> usize;

    /// 父节点索引（根节点返回 None）
    fn parent_of(&self, index: usize) -> Option<usize>;

    /// 子节点索引（按声明顺序）
    fn children_of(&self, index: usize) -> &[usize];

    /// 是否为骨骼关节节点
    fn is_joint(&self, index: usize) -> bool;

    /// 尾端元数据
    fn tail_of(&self, index: usize) -> Option<BoneTail>;

    /// 本地旋转
    fn local_rotation(&self, index: usize) -> Quat;

    /// 写入本地旋转并刷新世界变换
    fn set_local_rotation(&mut self, index: usize, rotation: Quat);

    /// 世界变换矩阵 (local_to_world)
    fn world_matrix(&self, index: usize) -> Mat4;

    // ========================================
    // 派生查询
    // ========================================

    #[inline]
    fn contains(&self, index: usize) -> bool {
        index < self.node_count()
    }

    /// 世界位置
    #[inline]
    fn world_position(&self, index: usize) -> Vec3 {
        self.world_matrix(index).w_axis.truncate()
    }

    /// 世界旋转（忽略缩放）
    #[inline]
    fn world_rotation(&self, index: usize) -> Quat {
        let (_, rotation, _) = self.world_matrix(index).to_scale_rotation_translation();
        rotation
    }

    /// 父节点世界旋转，根节点为单位旋转
    #[inline]
    fn parent_world_rotation(&self, index: usize) -> Quat {
        self.parent_of(index)
            .map_or(Quat::IDENTITY, |parent| self.world_rotation(parent))
    }

    /// 节点本地空间的点 → 世界空间
    #[inline]
    fn local_to_world(&self, index: usize, point: Vec3) -> Vec3 {
        self.world_matrix(index).transform_point3(point)
    }

    /// 深度优先（先序）收集子树中的关节节点，包含根本身
    ///
    /// 非关节节点不会被收集，但仍会继续遍历其后代。
    fn collect_joints(&self, root: usize) -> Vec<usize> {
        let mut joints = Vec::new();
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            if self.is_joint(index) {
                joints.push(index);
            }
            // 逆序压栈，出栈顺序即子节点声明顺序
            stack.extend(self.children_of(index).iter().rev().copied());
        }
        joints
    }
}

// ============================================================================
// 类型别名
// ============================================================================

/// Skeleton 别名
pub type Skeleton = BoneSet;
