//! 弹簧骨骼物理模块
//!
//! - config: 全局可调参数
//! - rig: 外部加载器提供的静态描述
//! - sphere_collider: 碰撞球 / 碰撞组
//! - spring_bone: 弹簧骨骼 / 弹簧骨骼组
//! - vrm_physics: 每帧驱动的控制器

pub mod config;
pub mod rig;
mod sphere_collider;
mod spring_bone;
mod vrm_physics;

pub use config::{PhysicsConfig, get_config, set_config, reset_config};
pub use rig::{SecondaryAnimation, BoneGroupConfig, ColliderGroupConfig, ColliderConfig};
pub use sphere_collider::{SphereCollider, SphereColliderGroup};
pub use spring_bone::{SpringBone, SpringBoneGroup, SpringParams};
pub use vrm_physics::VrmPhysics;
