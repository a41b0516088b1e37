// 存储配置定义

use serde::{Deserialize, Serialize};

/// 数据库配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径（相对路径基于数据目录）
    pub db_path: String,
    /// 连接池最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_path: "dermalens.db".to_string(),
            max_connections: default_max_connections(),
        }
    }
}
