//! 静态骨骼物理描述（由外部加载器填充）
//!
//! 字段含义与 VRM 0.x `secondaryAnimation` 扩展一致，
//! 节点引用均为骨骼层次中的索引，-1 表示“无”。

use glam::Vec3;

/// 二级动画描述
#[derive(Clone, Debug, Default)]
pub struct SecondaryAnimation {
    /// 弹簧骨骼组
    pub bone_groups: Vec<BoneGroupConfig>,
    /// 碰撞组
    pub collider_groups: Vec<ColliderGroupConfig>,
}

/// 弹簧骨骼组配置
#[derive(Clone, Debug)]
pub struct BoneGroupConfig {
    /// 刚度（回到静止姿态的力度）
    pub stiffness: f32,
    /// 重力强度
    pub gravity_power: f32,
    /// 重力方向（构建时归一化）
    pub gravity_dir: Vec3,
    /// 阻力 [0, 1]
    pub drag_force: f32,
    /// 中心节点索引，-1 表示使用世界空间
    pub center: i32,
    /// 弹簧骨骼与碰撞球的接触半径
    pub hit_radius: f32,
    /// 子树根节点，其下所有关节都会成为弹簧骨骼
    pub bones: Vec<i32>,
    /// 参与碰撞的碰撞组索引
    pub collider_groups: Vec<i32>,
}

impl Default for BoneGroupConfig {
    fn default() -> Self {
        Self {
            stiffness: 1.0,
            gravity_power: 1.0,
            gravity_dir: Vec3::new(0.0, -1.0, 0.0),
            drag_force: 0.4,
            center: -1,
            hit_radius: 0.02,
            bones: Vec::new(),
            collider_groups: Vec::new(),
        }
    }
}

/// 碰撞组配置
#[derive(Clone, Debug)]
pub struct ColliderGroupConfig {
    /// 挂载节点索引
    pub node: i32,
    /// 碰撞球列表
    pub colliders: Vec<ColliderConfig>,
}

/// 碰撞球配置
#[derive(Clone, Copy, Debug)]
pub struct ColliderConfig {
    /// 挂载节点本地空间中的偏移
    pub offset: Vec3,
    /// 半径
    pub radius: f32,
}

impl ColliderConfig {
    pub fn new(offset: Vec3, radius: f32) -> Self {
        Self { offset, radius }
    }

    /// 从 VRM 0.x 原始数据创建
    ///
    /// VRM 0.x 的碰撞球偏移 Z 轴与节点空间相反，这里翻转 Z 轴。
    pub fn from_vrm0(offset: [f32; 3], radius: f32) -> Self {
        Self {
            offset: Vec3::new(offset[0], offset[1], -offset[2]),
            radius,
        }
    }
}
