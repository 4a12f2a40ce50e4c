//! 错误类型
//!
//! 只有构建期的配置错误会以 `VrmError` 返回；
//! 每帧更新中的数值退化在本地跳过，不会向上传播。

use thiserror::Error;

/// VRM 引擎错误
#[derive(Debug, Error)]
pub enum VrmError {
    /// 引用的节点索引不存在
    #[error("node {index} referenced by {context} does not exist")]
    MissingNode { index: i32, context: &'static str },

    /// 引用的碰撞组索引不存在
    #[error("bone group {group} references missing collider group {index}")]
    MissingColliderGroup { group: usize, index: i32 },

    /// 碰撞球半径非法（负数或非有限值）
    #[error("invalid collider radius {radius}")]
    InvalidRadius { radius: f32 },

    /// 骨骼组碰撞半径非法
    #[error("bone group {group} has invalid hit radius {radius}")]
    InvalidHitRadius { group: usize, radius: f32 },

    /// 节点没有可用的尾端信息
    #[error("node {node} has no tail axis/length metadata")]
    MissingTail { node: usize },

    /// 尾端长度或轴非法
    #[error("node {node} has invalid tail length {length}")]
    InvalidBoneLength { node: usize, length: f32 },

    /// 同一节点被多个弹簧骨骼驱动
    #[error("node {node} is driven by more than one spring bone")]
    DuplicateSpringBone { node: usize },

    /// 骨骼层次结构非法
    #[error("malformed hierarchy: {0}")]
    MalformedHierarchy(String),
}

/// `Result<T, VrmError>` 简写
pub type Result<T> = std::result::Result<T, VrmError>;
