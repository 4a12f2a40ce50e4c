//! VRM 引擎 - 骨骼弹簧物理（SpringBone）运行时
//!
//! 模块划分：
//! - skeleton: 骨骼层次结构（Hierarchy trait + 参考实现 BoneSet）
//! - physics: 碰撞球、弹簧骨骼、物理控制器

pub mod error;
pub mod skeleton;
pub mod physics;

pub use error::{VrmError, Result};
pub use skeleton::{BoneLink, BoneSet, BoneTail, Hierarchy, NodeFlags, NodeTransform};
pub use physics::{
    VrmPhysics, SecondaryAnimation, BoneGroupConfig, ColliderGroupConfig, ColliderConfig,
    PhysicsConfig, get_config, set_config, reset_config,
};
