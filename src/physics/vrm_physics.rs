//! VRM 弹簧骨骼物理控制器
//!
//! 由静态的 `SecondaryAnimation` 一次性构建所有碰撞组与弹簧骨骼组。
//! 每帧流程固定：[全部碰撞组 update → 全部弹簧骨骼组 update]，
//! 碰撞球必须先反映本帧姿态，弹簧骨骼才能检测到正确位置。

use std::collections::HashSet;

use crate::{VrmError, Result};
use crate::skeleton::Hierarchy;

use super::config::get_config;
use super::rig::SecondaryAnimation;
use super::sphere_collider::SphereColliderGroup;
use super::spring_bone::{SpringBoneGroup, SpringParams};

/// 把配置中的节点索引解析为有效索引
fn resolve_node<H: Hierarchy + ?Sized>(skeleton: &H, index: i32, context: &'static str) -> Result<usize> {
    if index >= 0 && skeleton.contains(index as usize) {
        Ok(index as usize)
    } else {
        Err(VrmError::MissingNode { index, context })
    }
}

/// VRM 物理控制器
///
/// 持有所有碰撞组与弹簧骨骼组；骨骼层次由调用方持有，
/// 每次 `reset`/`update` 以 `&mut` 借入，保证调用期间独占访问。
#[derive(Clone, Debug)]
pub struct VrmPhysics {
    /// 弹簧骨骼组（构建顺序即更新顺序）
    spring_bone_groups: Vec<SpringBoneGroup>,
    /// 碰撞组（按配置索引存放）
    sphere_collider_groups: Vec<SphereColliderGroup>,
    /// 所有被物理驱动的节点（构建时计算一次）
    driven_bones: HashSet<usize>,
}

impl VrmPhysics {
    /// 构建物理系统
    ///
    /// 先创建碰撞组（弹簧骨骼组按索引引用它们），再逐组遍历子树收集关节。
    /// 任何缺失的节点/碰撞组引用、非法半径或重复驱动的节点都会直接失败。
    pub fn new<H: Hierarchy + ?Sized>(rig: &SecondaryAnimation, skeleton: &H) -> Result<Self> {
        let config = get_config();

        // 第一步：碰撞组
        let mut sphere_collider_groups = Vec::with_capacity(rig.collider_groups.len());
        for collider_group in &rig.collider_groups {
            let node = resolve_node(skeleton, collider_group.node, "collider group")?;
            let mut group = SphereColliderGroup::new(node);
            for collider in &collider_group.colliders {
                group.create_sphere_collider(skeleton, collider.offset, collider.radius)?;
            }
            sphere_collider_groups.push(group);
        }

        // 第二步：弹簧骨骼组
        let mut spring_bone_groups = Vec::with_capacity(rig.bone_groups.len());
        let mut driven_bones = HashSet::new();
        for (group_index, bone_group) in rig.bone_groups.iter().enumerate() {
            let center = if bone_group.center < 0 {
                None
            } else {
                Some(resolve_node(skeleton, bone_group.center, "bone group center")?)
            };
            let params = SpringParams::from_config(group_index, bone_group, center)?;

            let collider_indices = bone_group
                .collider_groups
                .iter()
                .map(|&index| {
                    if index >= 0 && (index as usize) < sphere_collider_groups.len() {
                        Ok(index as usize)
                    } else {
                        Err(VrmError::MissingColliderGroup { group: group_index, index })
                    }
                })
                .collect::<Result<Vec<_>>>()?;

            let mut group = SpringBoneGroup::new(params, collider_indices);
            for &root in &bone_group.bones {
                let root = resolve_node(skeleton, root, "bone group root")?;
                for node in skeleton.collect_joints(root) {
                    if !driven_bones.insert(node) {
                        return Err(VrmError::DuplicateSpringBone { node });
                    }
                    group.create_spring_bone(skeleton, node)?;
                }
            }

            if config.debug_log {
                log::debug!(
                    "[SpringBone] 组 {}: {} 骨骼, {} 碰撞组, center={:?}",
                    group_index,
                    group.spring_bones().len(),
                    group.collider_groups().len(),
                    center
                );
            }
            spring_bone_groups.push(group);
        }

        let collider_count: usize = sphere_collider_groups.iter().map(|g| g.colliders().len()).sum();
        log::info!(
            "SpringBone 物理构建完成: {} 组 ({} 骨骼), {} 碰撞组 ({} 碰撞球)",
            spring_bone_groups.len(),
            driven_bones.len(),
            sphere_collider_groups.len(),
            collider_count
        );

        Ok(Self {
            spring_bone_groups,
            sphere_collider_groups,
            driven_bones,
        })
    }

    /// 所有弹簧骨骼恢复静止姿态，下一帧重新从当前姿态初始化
    ///
    /// 用于动画切换/重播后，避免沿用过期的尾端状态。
    pub fn reset<H: Hierarchy + ?Sized>(&mut self, skeleton: &mut H) -> &mut Self {
        for group in &mut self.spring_bone_groups {
            group.reset(skeleton);
        }
        self
    }

    /// 推进一帧
    ///
    /// `delta <= 0` 时整帧跳过。
    pub fn update<H: Hierarchy + ?Sized>(&mut self, skeleton: &mut H, delta: f32) -> &mut Self {
        if !(delta > 0.0) {
            return self;
        }
        let config = get_config();
        let delta = config.clamp_delta(delta);

        for group in &mut self.sphere_collider_groups {
            group.update(&*skeleton);
        }
        for group in &mut self.spring_bone_groups {
            group.update(skeleton, &self.sphere_collider_groups, delta);
        }

        if config.debug_log {
            log::debug!(
                "[SpringBone] update: delta={:.4}, {} 骨骼",
                delta,
                self.driven_bones.len()
            );
        }
        self
    }

    #[inline]
    pub fn spring_bone_groups(&self) -> &[SpringBoneGroup] {
        &self.spring_bone_groups
    }

    #[inline]
    pub fn sphere_collider_groups(&self) -> &[SphereColliderGroup] {
        &self.sphere_collider_groups
    }

    pub fn spring_bone_count(&self) -> usize {
        self.driven_bones.len()
    }

    pub fn collider_group_count(&self) -> usize {
        self.sphere_collider_groups.len()
    }

    /// 被物理驱动的节点集合（构建时已预计算，零分配）
    #[inline]
    pub fn driven_bones(&self) -> &HashSet<usize> {
        &self.driven_bones
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};
    use crate::physics::rig::{BoneGroupConfig, ColliderConfig, ColliderGroupConfig};
    use crate::skeleton::{BoneLink, Skeleton};

    const DT: f32 = 1.0 / 60.0;

    /// root(原点) ── bone(原点)，尾端沿 +Y 延伸 0.1；head 为独立节点
    fn collider_skeleton() -> Skeleton {
        Skeleton::new(vec![
            BoneLink::joint("root", -1, Vec3::ZERO),
            BoneLink::joint("bone", 0, Vec3::ZERO).with_tail(Vec3::Y, 0.1),
            BoneLink::joint("head", 0, Vec3::ZERO),
        ])
        .unwrap()
    }

    fn still_group(bones: Vec<i32>, collider_groups: Vec<i32>) -> BoneGroupConfig {
        BoneGroupConfig {
            stiffness: 0.0,
            gravity_power: 0.0,
            drag_force: 0.0,
            bones,
            collider_groups,
            ..BoneGroupConfig::default()
        }
    }

    fn tail_of(physics: &VrmPhysics, group: usize, bone: usize) -> Vec3 {
        physics.spring_bone_groups()[group].spring_bones()[bone].tail()
    }

    #[test]
    fn test_gravity_sag_scenario() {
        // 骨骼静止姿态把本地 +Y 转到世界 +X，重力才能让它下垂
        let rest = Quat::from_rotation_z(-std::f32::consts::FRAC_PI_2);
        let mut skeleton = Skeleton::new(vec![
            BoneLink::joint("root", -1, Vec3::ZERO),
            BoneLink::joint("bone", 0, Vec3::new(0.0, 1.0, 0.0))
                .with_rotation(rest)
                .with_tail(Vec3::Y, 0.1),
        ])
        .unwrap();
        let rig = SecondaryAnimation {
            bone_groups: vec![BoneGroupConfig {
                stiffness: 1.0,
                drag_force: 0.4,
                gravity_power: 1.0,
                gravity_dir: Vec3::new(0.0, -1.0, 0.0),
                hit_radius: 0.02,
                bones: vec![1],
                ..BoneGroupConfig::default()
            }],
            collider_groups: Vec::new(),
        };
        let mut physics = VrmPhysics::new(&rig, &skeleton).unwrap();

        let rest_tail = skeleton.local_to_world(1, Vec3::Y * 0.1);
        assert!((rest_tail - Vec3::new(0.1, 1.0, 0.0)).length() < 1e-5);

        let mut previous = skeleton.local_rotation(1);
        let mut last_step = f32::MAX;
        for _ in 0..120 {
            physics.update(&mut skeleton, DT);
            let current = skeleton.local_rotation(1);
            last_step = (current - previous).length().min((current + previous).length());
            previous = current;
        }

        let tail = tail_of(&physics, 0, 0);
        assert!(tail.y < rest_tail.y - 0.05, "tail should sag: {:?}", tail);
        assert!(((tail - skeleton.world_position(1)).length() - 0.1).abs() < 1e-5);
        assert!(last_step < 1e-4, "rotation should settle, last step {}", last_step);
        assert!(tail.is_finite());
    }

    #[test]
    fn test_overlapping_colliders_resolve_in_order() {
        let hit_radius = 0.02;
        let a = (Vec3::new(0.02, 0.1, 0.0), 0.03);
        let b = (Vec3::new(-0.03, 0.09, 0.0), 0.03);

        // 独立计算的顺序推出结果
        let sequential = |order: [(Vec3, f32); 2]| {
            let mut tail = Vec3::new(0.0, 0.1, 0.0);
            for (center, radius) in order {
                let r = hit_radius + radius;
                let offset = tail - center;
                if offset.length() <= r {
                    tail = (center + offset.normalize() * r).normalize() * 0.1;
                }
            }
            tail
        };
        let forward = sequential([a, b]);
        let backward = sequential([b, a]);
        assert!((forward - backward).length() > 1e-3);

        let run = |first: (Vec3, f32), second: (Vec3, f32)| {
            let mut skeleton = collider_skeleton();
            let rig = SecondaryAnimation {
                bone_groups: vec![still_group(vec![1], vec![0, 1])],
                collider_groups: vec![
                    ColliderGroupConfig { node: 2, colliders: vec![ColliderConfig::new(first.0, first.1)] },
                    ColliderGroupConfig { node: 2, colliders: vec![ColliderConfig::new(second.0, second.1)] },
                ],
            };
            let mut physics = VrmPhysics::new(&rig, &skeleton).unwrap();
            physics.update(&mut skeleton, DT);
            tail_of(&physics, 0, 0)
        };

        assert!((run(a, b) - forward).length() < 1e-5);
        assert!((run(b, a) - backward).length() < 1e-5);

        // 同一碰撞组内同样按声明顺序
        let mut skeleton = collider_skeleton();
        let rig = SecondaryAnimation {
            bone_groups: vec![still_group(vec![1], vec![0])],
            collider_groups: vec![ColliderGroupConfig {
                node: 2,
                colliders: vec![ColliderConfig::new(a.0, a.1), ColliderConfig::new(b.0, b.1)],
            }],
        };
        let mut physics = VrmPhysics::new(&rig, &skeleton).unwrap();
        physics.update(&mut skeleton, DT);
        assert!((tail_of(&physics, 0, 0) - forward).length() < 1e-5);
    }

    #[test]
    fn test_colliders_update_before_springs() {
        let mut skeleton = collider_skeleton();
        // head 远离骨骼，碰撞球初始不接触尾端
        skeleton.set_local_translation(2, Vec3::new(5.0, 0.0, 0.0));
        let rig = SecondaryAnimation {
            bone_groups: vec![still_group(vec![1], vec![0])],
            collider_groups: vec![ColliderGroupConfig {
                node: 2,
                colliders: vec![ColliderConfig::new(Vec3::ZERO, 0.05)],
            }],
        };
        let mut physics = VrmPhysics::new(&rig, &skeleton).unwrap();

        // 同一帧内把 head 移到尾端右侧，碰撞必须在本帧生效
        skeleton.set_local_translation(2, Vec3::new(0.03, 0.1, 0.0));
        physics.update(&mut skeleton, DT);

        let collider = &physics.sphere_collider_groups()[0].colliders()[0];
        assert!((collider.world_position - Vec3::new(0.03, 0.1, 0.0)).length() < 1e-6);
        assert!(tail_of(&physics, 0, 0).x < 0.0);
    }

    #[test]
    fn test_center_keeps_tail_under_root_motion() {
        let build = |center: i32| {
            let skeleton = Skeleton::new(vec![
                BoneLink::joint("root", -1, Vec3::ZERO),
                BoneLink::joint("hips", 0, Vec3::new(0.0, 1.0, 0.0)),
                BoneLink::joint("hair", 1, Vec3::ZERO).with_tail(Vec3::Y, 0.1),
            ])
            .unwrap();
            let rig = SecondaryAnimation {
                bone_groups: vec![BoneGroupConfig {
                    gravity_power: 0.0,
                    center,
                    bones: vec![2],
                    ..BoneGroupConfig::default()
                }],
                collider_groups: Vec::new(),
            };
            let physics = VrmPhysics::new(&rig, &skeleton).unwrap();
            (skeleton, physics)
        };

        for (center, expect_still) in [(0, true), (-1, false)] {
            let (mut skeleton, mut physics) = build(center);
            physics.update(&mut skeleton, DT);

            // 根节点瞬移
            skeleton.set_local_translation(0, Vec3::new(3.0, 0.0, 0.0));
            physics.update(&mut skeleton, DT);

            let still = skeleton.local_rotation(2).dot(Quat::IDENTITY).abs() > 1.0 - 1e-5;
            assert_eq!(still, expect_still, "center = {}", center);
        }
    }

    #[test]
    fn test_reset_and_update_chain() {
        let mut skeleton = collider_skeleton();
        let rig = SecondaryAnimation {
            bone_groups: vec![BoneGroupConfig {
                gravity_dir: Vec3::new(1.0, 0.0, 0.0),
                gravity_power: 4.0,
                bones: vec![1],
                ..BoneGroupConfig::default()
            }],
            collider_groups: Vec::new(),
        };
        let mut physics = VrmPhysics::new(&rig, &skeleton).unwrap();

        physics.update(&mut skeleton, DT).update(&mut skeleton, DT);
        assert!(skeleton.local_rotation(1).angle_between(Quat::IDENTITY) > 1e-3);

        physics.reset(&mut skeleton);
        assert_eq!(skeleton.local_rotation(1), Quat::IDENTITY);
        assert!(physics.spring_bone_groups()[0].spring_bones().iter().all(|s| !s.is_initialized()));

        let rotation = skeleton.local_rotation(1);
        physics.update(&mut skeleton, 0.0).update(&mut skeleton, -DT);
        assert_eq!(skeleton.local_rotation(1), rotation);
    }

    #[test]
    fn test_subtree_collects_joints_only() {
        let mut accessory = BoneLink::new("accessory");
        accessory.parent_index = 1;
        let skeleton = Skeleton::new(vec![
            BoneLink::joint("root", -1, Vec3::ZERO),
            BoneLink::joint("hair1", 0, Vec3::Y),
            BoneLink::joint("hair2", 1, Vec3::new(0.0, 0.1, 0.0)),
            accessory,
            BoneLink::joint("hair3", 2, Vec3::new(0.0, 0.1, 0.0)),
        ])
        .unwrap();
        let rig = SecondaryAnimation {
            bone_groups: vec![BoneGroupConfig { bones: vec![1], ..BoneGroupConfig::default() }],
            collider_groups: Vec::new(),
        };
        let physics = VrmPhysics::new(&rig, &skeleton).unwrap();

        let bones: Vec<usize> = physics.spring_bone_groups()[0]
            .spring_bones()
            .iter()
            .map(|s| s.bone())
            .collect();
        assert_eq!(bones, vec![1, 2, 4]);
        assert_eq!(physics.spring_bone_count(), 3);
        assert!(!physics.driven_bones().contains(&3));
    }

    #[test]
    fn test_construction_errors() {
        let skeleton = collider_skeleton();

        let missing_root = SecondaryAnimation {
            bone_groups: vec![still_group(vec![9], Vec::new())],
            collider_groups: Vec::new(),
        };
        assert!(matches!(
            VrmPhysics::new(&missing_root, &skeleton),
            Err(VrmError::MissingNode { index: 9, .. })
        ));

        let missing_center = SecondaryAnimation {
            bone_groups: vec![BoneGroupConfig { center: 7, bones: vec![1], ..BoneGroupConfig::default() }],
            collider_groups: Vec::new(),
        };
        assert!(matches!(
            VrmPhysics::new(&missing_center, &skeleton),
            Err(VrmError::MissingNode { index: 7, .. })
        ));

        let missing_collider_group = SecondaryAnimation {
            bone_groups: vec![still_group(vec![1], vec![0, 3])],
            collider_groups: vec![ColliderGroupConfig { node: 2, colliders: Vec::new() }],
        };
        assert!(matches!(
            VrmPhysics::new(&missing_collider_group, &skeleton),
            Err(VrmError::MissingColliderGroup { group: 0, index: 3 })
        ));

        let bad_radius = SecondaryAnimation {
            bone_groups: Vec::new(),
            collider_groups: vec![ColliderGroupConfig {
                node: 2,
                colliders: vec![ColliderConfig::new(Vec3::ZERO, -0.1)],
            }],
        };
        assert!(matches!(
            VrmPhysics::new(&bad_radius, &skeleton),
            Err(VrmError::InvalidRadius { .. })
        ));

        let bad_hit_radius = SecondaryAnimation {
            bone_groups: vec![BoneGroupConfig { hit_radius: -1.0, bones: vec![1], ..BoneGroupConfig::default() }],
            collider_groups: Vec::new(),
        };
        assert!(matches!(
            VrmPhysics::new(&bad_hit_radius, &skeleton),
            Err(VrmError::InvalidHitRadius { group: 0, .. })
        ));

        let duplicate = SecondaryAnimation {
            bone_groups: vec![still_group(vec![1], Vec::new()), still_group(vec![1], Vec::new())],
            collider_groups: Vec::new(),
        };
        assert!(matches!(
            VrmPhysics::new(&duplicate, &skeleton),
            Err(VrmError::DuplicateSpringBone { node: 1 })
        ));
    }

    #[test]
    fn test_drag_clamped_and_gravity_normalized() {
        let skeleton = collider_skeleton();
        let rig = SecondaryAnimation {
            bone_groups: vec![BoneGroupConfig {
                drag_force: 1.5,
                gravity_dir: Vec3::new(0.0, -3.0, 4.0),
                bones: vec![1],
                ..BoneGroupConfig::default()
            }],
            collider_groups: Vec::new(),
        };
        let physics = VrmPhysics::new(&rig, &skeleton).unwrap();
        let params = &physics.spring_bone_groups()[0].params;
        assert_eq!(params.drag_force, 1.0);
        assert!((params.gravity_dir - Vec3::new(0.0, -0.6, 0.8)).length() < 1e-6);
        assert_eq!(params.center, None);
    }

    #[test]
    fn test_update_applies_max_delta_time() {
        use crate::physics::config::{reset_config, set_config, PhysicsConfig, TEST_CONFIG_LOCK};

        let _guard = TEST_CONFIG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        // 重力沿 +X，尾端偏移量随 delta 变化
        let rig = SecondaryAnimation {
            bone_groups: vec![BoneGroupConfig {
                gravity_power: 1.0,
                gravity_dir: Vec3::X,
                ..still_group(vec![1], vec![])
            }],
            collider_groups: vec![],
        };
        let step = |delta: f32| {
            let mut skeleton = collider_skeleton();
            let mut physics = VrmPhysics::new(&rig, &skeleton).unwrap();
            physics.update(&mut skeleton, delta);
            tail_of(&physics, 0, 0)
        };

        set_config(PhysicsConfig { max_delta_time: Some(0.05), ..PhysicsConfig::default() });
        let hitch = step(0.5);
        let clamped = step(0.05);
        reset_config();
        let unclamped = step(0.5);

        assert!((hitch - clamped).length() < 1e-6);
        assert!((hitch - unclamped).length() > 1e-3);
        assert!((hitch.length() - 0.1).abs() < 1e-5);
    }
}
