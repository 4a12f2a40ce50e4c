//! 骨骼节点 - 参考 nphysics MultibodyLink 设计
//!
//! BoneLink 是参考骨骼的基本单元，类似于 nphysics 的 MultibodyLink。
//! 每个 BoneLink 代表层次中的一个节点（关节或普通挂点）。

use glam::{Vec3, Quat, Mat4};
use bitflags::bitflags;

use super::{BoneTail, NodeTransform};

// ============================================================================
// 节点标志
// ============================================================================

bitflags! {
    /// 节点标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct NodeFlags: u32 {
        /// 骨骼关节（子树遍历时会被收集为弹簧骨骼）
        const JOINT = 1 << 0;
    }
}

// ============================================================================
// 骨骼节点
// ============================================================================

/// 骨骼节点 - 类似 nphysics MultibodyLink
///
/// 设计原则（参考 nphysics）：
/// - 静态数据：节点的固有属性（名称、父子关系、标志、尾端元数据）
/// - 动态数据：本地变换以及由它推导出的矩阵缓存
/// - 变换计算：local_to_world = parent.local_to_world * local_to_parent
#[derive(Clone, Debug)]
pub struct BoneLink {
    // ========================================
    // 静态数据
    // ========================================

    /// 节点名称
    pub name: String,

    /// 父节点索引 (-1 表示根节点)
    pub parent_index: i32,

    /// 节点标志
    pub flags: NodeFlags,

    /// 尾端元数据（None 时由 BoneSet 按子节点推导）
    pub tail: Option<BoneTail>,

    // ========================================
    // 动态数据
    // ========================================

    /// 本地变换
    pub transform: NodeTransform,

    /// 本地变换矩阵 (local_to_parent)
    pub local_to_parent: Mat4,

    /// 全局变换矩阵 (local_to_world)
    pub local_to_world: Mat4,

    /// 父节点到世界的变换（缓存，根节点为单位矩阵）
    pub(crate) parent_to_world: Mat4,
}

impl BoneLink {
    /// 创建新节点（普通挂点，非关节）
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_index: -1,
            flags: NodeFlags::empty(),
            tail: None,
            transform: NodeTransform::default(),
            local_to_parent: Mat4::IDENTITY,
            local_to_world: Mat4::IDENTITY,
            parent_to_world: Mat4::IDENTITY,
        }
    }

    /// 创建关节节点
    pub fn joint(name: impl Into<String>, parent_index: i32, translation: Vec3) -> Self {
        let mut bone = Self::new(name);
        bone.parent_index = parent_index;
        bone.flags = NodeFlags::JOINT;
        bone.transform.translation = translation;
        bone
    }

    /// 设置本地旋转（构建用）
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.transform.rotation = rotation;
        self
    }

    /// 设置尾端元数据（构建用）
    pub fn with_tail(mut self, axis: Vec3, length: f32) -> Self {
        self.tail = Some(BoneTail::new(axis, length));
        self
    }

    // ========================================
    // 访问器
    // ========================================

    /// 父节点索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        if self.parent_index >= 0 {
            Some(self.parent_index as usize)
        } else {
            None
        }
    }

    /// 是否为根节点
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }

    #[inline]
    pub fn is_joint(&self) -> bool {
        self.flags.contains(NodeFlags::JOINT)
    }

    // ========================================
    // 变换计算
    // ========================================

    /// 计算本地变换 (local_to_parent)
    #[inline]
    pub fn compute_local_transform(&mut self) {
        self.local_to_parent = self.transform.to_matrix();
    }
}
