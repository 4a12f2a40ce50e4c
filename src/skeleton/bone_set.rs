//! 骨骼集合 - 参考 nphysics Multibody 设计
//!
//! BoneSet 持有所有 BoneLink，缓存子节点列表，
//! 并负责沿层次结构自上而下传播世界变换。

use glam::{Vec3, Quat, Mat4};

use crate::{VrmError, Result};
use crate::physics::config::get_config;

use super::bone_link::BoneLink;
use super::{BoneTail, Hierarchy};

/// 骨骼集合
#[derive(Clone, Debug)]
pub struct BoneSet {
    /// 所有节点（索引即节点 ID）
    bones: Vec<BoneLink>,
    /// 子节点缓存（按声明顺序）
    children_cache: Vec<Vec<usize>>,
    /// 根节点列表
    roots: Vec<usize>,
}

impl BoneSet {
    /// 构建骨骼集合
    ///
    /// 校验父索引范围并拒绝环，然后计算所有世界变换。
    pub fn new(bones: Vec<BoneLink>) -> Result<Self> {
        let count = bones.len();
        let mut children_cache = vec![Vec::new(); count];
        let mut roots = Vec::new();

        for (i, bone) in bones.iter().enumerate() {
            match bone.parent_id() {
                None => roots.push(i),
                Some(parent) if parent >= count => {
                    return Err(VrmError::MalformedHierarchy(format!(
                        "node '{}' ({}) has out-of-range parent {}",
                        bone.name, i, parent
                    )));
                }
                Some(parent) if parent == i => {
                    return Err(VrmError::MalformedHierarchy(format!(
                        "node '{}' ({}) is its own parent",
                        bone.name, i
                    )));
                }
                Some(parent) => children_cache[parent].push(i),
            }
        }

        // 从根出发必须能到达所有节点，否则存在环
        let mut reached = 0usize;
        let mut stack = roots.clone();
        while let Some(index) = stack.pop() {
            reached += 1;
            stack.extend(children_cache[index].iter().copied());
        }
        if reached != count {
            return Err(VrmError::MalformedHierarchy(format!(
                "{} node(s) are part of a parent cycle",
                count - reached
            )));
        }

        let mut set = Self { bones, children_cache, roots };
        set.update_world_transforms();
        Ok(set)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&BoneLink> {
        self.bones.get(index)
    }

    /// 设置本地平移并刷新子树（用于驱动根运动等）
    ///
    /// 越界索引忽略，与 `set_local_rotation` 一致。
    pub fn set_local_translation(&mut self, index: usize, translation: Vec3) {
        if index >= self.bones.len() {
            return;
        }
        self.bones[index].transform.translation = translation;
        self.bones[index].compute_local_transform();
        self.update_global_transform_recursive(index);
    }

    /// 重新计算所有节点的世界变换
    pub fn update_world_transforms(&mut self) {
        for bone in &mut self.bones {
            bone.compute_local_transform();
        }
        for i in 0..self.roots.len() {
            let root = self.roots[i];
            self.update_global_transform_recursive(root);
        }
    }

    /// 递归更新全局变换
    fn update_global_transform_recursive(&mut self, index: usize) {
        let parent_global = match self.bones[index].parent_id() {
            Some(parent) => self.bones[parent].local_to_world,
            None => Mat4::IDENTITY,
        };
        let bone = &mut self.bones[index];
        bone.parent_to_world = parent_global;
        bone.local_to_world = parent_global * bone.local_to_parent;

        for i in 0..self.children_cache[index].len() {
            let child = self.children_cache[index][i];
            self.update_global_transform_recursive(child);
        }
    }

    /// 推导尾端元数据
    ///
    /// 有子节点时指向第一个子节点；叶节点沿父→自身方向延伸默认长度。
    fn derived_tail(&self, index: usize) -> Option<BoneTail> {
        let bone = &self.bones[index];
        if let Some(&child) = self.children_cache[index].first() {
            let offset = self.bones[child].transform.translation;
            let length = offset.length();
            return offset.try_normalize().map(|axis| BoneTail::new(axis, length));
        }

        if bone.is_root() {
            return None;
        }
        let direction = bone.transform.rotation.inverse() * bone.transform.translation;
        direction
            .try_normalize()
            .map(|axis| BoneTail::new(axis, get_config().default_tail_length))
    }
}

impl Hierarchy for BoneSet {
    #[inline]
    fn node_count(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    fn parent_of(&self, index: usize) -> Option<usize> {
        self.bones[index].parent_id()
    }

    #[inline]
    fn children_of(&self, index: usize) -> &[usize] {
        &self.children_cache[index]
    }

    #[inline]
    fn is_joint(&self, index: usize) -> bool {
        self.bones[index].is_joint()
    }

    fn tail_of(&self, index: usize) -> Option<BoneTail> {
        self.bones[index].tail.or_else(|| self.derived_tail(index))
    }

    #[inline]
    fn local_rotation(&self, index: usize) -> Quat {
        self.bones[index].transform.rotation
    }

    fn set_local_rotation(&mut self, index: usize, rotation: Quat) {
        if index >= self.bones.len() {
            return;
        }
        self.bones[index].transform.rotation = rotation;
        self.bones[index].compute_local_transform();
        self.update_global_transform_recursive(index);
    }

    #[inline]
    fn world_matrix(&self, index: usize) -> Mat4 {
        self.bones[index].local_to_world
    }

    /// 直接使用传播时缓存的父节点世界变换
    fn parent_world_rotation(&self, index: usize) -> Quat {
        let (_, rotation, _) = self.bones[index].parent_to_world.to_scale_rotation_translation();
        rotation
    }
}
