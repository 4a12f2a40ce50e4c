//! 碰撞球与碰撞组
//!
//! 碰撞球通过偏移刚性挂载在某个节点上，每帧重新计算世界空间球心。
//! 同一碰撞组内的所有碰撞球共享挂载节点，一次遍历完成更新。

use glam::{Mat4, Vec3};

use crate::{VrmError, Result};
use crate::skeleton::Hierarchy;

/// 碰撞球
#[derive(Clone, Debug)]
pub struct SphereCollider {
    /// 挂载节点本地空间中的偏移
    pub offset: Vec3,
    /// 半径
    pub radius: f32,
    /// 世界空间球心（每帧刷新）
    pub world_position: Vec3,
}

impl SphereCollider {
    /// 创建碰撞球，拒绝负数或非有限半径
    pub fn new(offset: Vec3, radius: f32) -> Result<Self> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(VrmError::InvalidRadius { radius });
        }
        Ok(Self {
            offset,
            radius,
            world_position: offset,
        })
    }

    /// 根据挂载节点的世界变换刷新球心
    #[inline]
    pub fn update(&mut self, local_to_world: &Mat4) {
        self.world_position = local_to_world.transform_point3(self.offset);
    }
}

/// 碰撞组
#[derive(Clone, Debug)]
pub struct SphereColliderGroup {
    /// 挂载节点索引
    node: usize,
    /// 碰撞球（顺序即碰撞检测顺序）
    colliders: Vec<SphereCollider>,
}

impl SphereColliderGroup {
    pub fn new(node: usize) -> Self {
        Self {
            node,
            colliders: Vec::new(),
        }
    }

    /// 添加碰撞球，并立即按当前姿态计算球心
    pub fn create_sphere_collider<H: Hierarchy + ?Sized>(
        &mut self,
        skeleton: &H,
        offset: Vec3,
        radius: f32,
    ) -> Result<()> {
        let mut collider = SphereCollider::new(offset, radius)?;
        collider.update(&skeleton.world_matrix(self.node));
        self.colliders.push(collider);
        Ok(())
    }

    /// 刷新组内所有碰撞球
    pub fn update<H: Hierarchy + ?Sized>(&mut self, skeleton: &H) {
        let local_to_world = skeleton.world_matrix(self.node);
        for collider in &mut self.colliders {
            collider.update(&local_to_world);
        }
    }

    #[inline]
    pub fn colliders(&self) -> &[SphereCollider] {
        &self.colliders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use crate::skeleton::{BoneLink, BoneSet};

    fn skeleton() -> BoneSet {
        BoneSet::new(vec![
            BoneLink::joint("root", -1, Vec3::ZERO),
            BoneLink::joint("head", 0, Vec3::new(0.0, 1.5, 0.0)),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_negative_radius() {
        assert!(matches!(
            SphereCollider::new(Vec3::ZERO, -0.1),
            Err(VrmError::InvalidRadius { .. })
        ));
        assert!(SphereCollider::new(Vec3::ZERO, f32::NAN).is_err());
        assert!(SphereCollider::new(Vec3::ZERO, 0.0).is_ok());
    }

    #[test]
    fn test_world_position_follows_node() {
        let mut set = skeleton();
        let mut group = SphereColliderGroup::new(1);
        group.create_sphere_collider(&set, Vec3::new(0.0, 0.0, 0.1), 0.1).unwrap();
        assert!((group.colliders()[0].world_position - Vec3::new(0.0, 1.5, 0.1)).length() < 1e-6);

        set.set_local_rotation(1, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        group.update(&set);
        assert!((group.colliders()[0].world_position - Vec3::new(0.1, 1.5, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut set = skeleton();
        set.set_local_rotation(1, Quat::from_rotation_x(0.3));
        let mut group = SphereColliderGroup::new(1);
        group.create_sphere_collider(&set, Vec3::new(0.02, 0.05, -0.03), 0.08).unwrap();
        group.create_sphere_collider(&set, Vec3::new(-0.02, 0.0, 0.04), 0.05).unwrap();

        group.update(&set);
        let first: Vec<Vec3> = group.colliders().iter().map(|c| c.world_position).collect();
        for _ in 0..5 {
            group.update(&set);
        }
        let again: Vec<Vec3> = group.colliders().iter().map(|c| c.world_position).collect();
        assert_eq!(first, again);
    }
}
