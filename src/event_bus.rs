// 事件总线 - 用于核心与界面层之间的解耦通信
//
// 实现发布/订阅模式，界面层订阅扫描生命周期事件刷新视图
// 使用 tokio::sync::broadcast 实现高效的事件分发

use crate::models::Severity;
use tokio::sync::broadcast;

/// 应用事件枚举 - 定义所有可能的系统事件
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    // --- 扫描事件 ---

    /// 扫描开始
    ScanStarted {
        body_area: String,
    },

    /// 分析完成
    ScanCompleted {
        scan_id: String,
        anomaly_detected: bool,
        severity: Severity,
    },

    /// 扫描结果已保存
    ScanSaved {
        scan_id: String,
    },

    /// 扫描被取消，结果已丢弃
    ScanDiscarded {
        reason: String,
    },

    /// 扫描失败
    ScanFailed {
        error: String,
    },

    // --- 历史事件 ---

    /// 单条记录被删除
    ScanDeleted {
        scan_id: String,
    },

    /// 历史被清空或按保留期清理
    HistoryCleared {
        scans_deleted: u64,
    },

    // --- 系统事件 ---

    /// 配置更新事件
    ConfigUpdated {
        config_type: String,
    },
}

/// 事件总线
///
/// 使用 broadcast channel 实现发布/订阅模式
/// 支持多个订阅者同时接收事件
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// 创建新的事件总线
    ///
    /// # 参数
    /// - `capacity`: 事件缓冲区大小,建议 100-1000
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 发布事件
    ///
    /// 如果没有订阅者,事件会被丢弃(这是正常的)
    pub fn publish(&self, event: AppEvent) {
        match self.sender.send(event) {
            Ok(receiver_count) => {
                tracing::trace!("事件已发布，订阅者数量: {}", receiver_count);
            }
            Err(_) => {
                tracing::trace!("事件已发布但无订阅者");
            }
        }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// 获取当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_basic() {
        let bus = EventBus::new(100);
        let mut receiver = bus.subscribe();

        bus.publish(AppEvent::ScanSaved {
            scan_id: "s-1".to_string(),
        });

        match receiver.recv().await {
            Ok(AppEvent::ScanSaved { scan_id }) => assert_eq!(scan_id, "s-1"),
            _ => panic!("未收到预期事件"),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(100);
        let mut receiver1 = bus.subscribe();
        let mut receiver2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(AppEvent::HistoryCleared { scans_deleted: 3 });

        assert!(receiver1.try_recv().is_ok());
        assert!(receiver2.try_recv().is_ok());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.publish(AppEvent::ScanStarted {
            body_area: "Face".to_string(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
