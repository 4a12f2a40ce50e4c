//! 弹簧骨骼物理配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 物理配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    // ========== 骨骼尾端 ==========
    /// 叶节点没有尾端元数据时使用的默认长度，默认 0.07（与 UniVRM 一致）
    pub default_tail_length: f32,

    // ========== 时间步 ==========
    /// 单帧最大时间步（秒），None 表示不限制
    /// 卡顿帧的 delta 过大时积分会一次性甩出很远，可用此项钳制
    pub max_delta_time: Option<f32>,

    // ========== 调试 ==========
    /// 是否输出每帧调试日志，默认 false
    pub debug_log: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            default_tail_length: 0.07,
            max_delta_time: None,
            debug_log: false,
        }
    }
}

impl PhysicsConfig {
    /// 按配置钳制时间步
    #[inline]
    pub fn clamp_delta(&self, delta: f32) -> f32 {
        match self.max_delta_time {
            Some(max) if max > 0.0 => delta.min(max),
            _ => delta,
        }
    }
}

/// 全局配置实例
static PHYSICS_CONFIG: Lazy<RwLock<PhysicsConfig>> = Lazy::new(|| {
    RwLock::new(PhysicsConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> PhysicsConfig {
    PHYSICS_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: PhysicsConfig) {
    *PHYSICS_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *PHYSICS_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = PhysicsConfig::default();
}

/// 修改全局配置的测试之间互斥
#[cfg(test)]
pub(crate) static TEST_CONFIG_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
