//! 界面命令模块
//!
//! 界面层调用的全部接口，按功能分组：
//! - scan: 拍摄扫描与结果读取
//! - history: 历史查询、统计、删除与导出
//! - config: 配置管理
//!
//! 所有命令返回 `Result<T, String>`，错误统一转成可展示的文本

pub mod config;
pub mod history;
pub mod scan;

// 重新导出所有命令
pub use config::*;
pub use history::*;
pub use scan::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{SimulatedDetector, SimulationParams, BODY_AREAS};
    use crate::event_bus::AppEvent;
    use crate::models::{AppConfig, HistoryFilter, Severity};
    use crate::{init_app_state, AppState};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    async fn setup() -> (TempDir, AppState) {
        let dir = tempdir().unwrap();
        let state = init_app_state(dir.path()).await.unwrap();
        state.capture.replace_detector(Arc::new(SimulatedDetector::with_seed(
            SimulationParams::default().with_delay(Duration::ZERO),
            42,
        )));
        (dir, state)
    }

    #[tokio::test]
    async fn test_scan_then_read_back() {
        let (_dir, state) = setup().await;

        let record = start_scan(&state, "mock-image-uri".to_string(), Some("Back".to_string()))
            .await
            .unwrap();
        assert_eq!(record.body_area, "Back");
        assert!(!is_scanning(&state));

        let loaded = get_scan_result(&state, record.id.clone()).await.unwrap();
        assert_eq!(loaded, Some(record));

        let missing = get_scan_result(&state, "no-such-scan".to_string()).await.unwrap();
        assert!(missing.is_none());

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_scan_without_body_area_picks_one() {
        let (_dir, state) = setup().await;

        let record = start_scan(&state, "mock-image-uri".to_string(), None)
            .await
            .unwrap();
        assert!(BODY_AREAS.contains(&record.body_area.as_str()));

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_history_summary_and_delete() {
        let (_dir, state) = setup().await;

        let mut ids = Vec::new();
        for _ in 0..5 {
            let record = start_scan(&state, String::new(), Some("Chest".to_string()))
                .await
                .unwrap();
            ids.push(record.id);
        }

        let history = get_scan_history(&state, None).await.unwrap();
        assert_eq!(history.len(), 5);
        assert!(history.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let summary = get_scan_summary(&state).await.unwrap();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.detected + summary.clear, 5);

        let detected = get_scan_history(&state, Some(HistoryFilter::detected()))
            .await
            .unwrap();
        assert_eq!(detected.len() as i64, summary.detected);

        let mut events = state.event_bus.subscribe();
        delete_scan(&state, ids[0].clone()).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            AppEvent::ScanDeleted {
                scan_id: ids[0].clone()
            }
        );

        // 再次删除不报错
        delete_scan(&state, ids[0].clone()).await.unwrap();
        assert_eq!(get_scan_summary(&state).await.unwrap().total, 4);
        assert!(get_scan_result(&state, ids[0].clone()).await.unwrap().is_none());

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_blank_scan_id_is_rejected() {
        let (_dir, state) = setup().await;
        assert!(get_scan_result(&state, "  ".to_string()).await.is_err());
        assert!(delete_scan(&state, String::new()).await.is_err());
        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_clear_and_export() {
        let (dir, state) = setup().await;

        for _ in 0..3 {
            start_scan(&state, String::new(), Some("Face".to_string()))
                .await
                .unwrap();
        }

        let export_path = dir.path().join("export/scans.json");
        assert_eq!(export_history(&state, export_path.clone()).await.unwrap(), 3);
        assert!(export_path.exists());

        assert_eq!(clear_history(&state).await.unwrap(), 3);
        assert!(get_scan_history(&state, None).await.unwrap().is_empty());

        let stats = get_storage_stats(&state).await.unwrap();
        assert_eq!(stats.scan_count, 0);

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_update_config_auto_save_off() {
        let (_dir, state) = setup().await;

        let updated = update_config(
            &state,
            AppConfig {
                auto_save_scans: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(!updated.auto_save_scans);
        assert!(!get_app_config(&state).await.unwrap().auto_save_scans);

        let record = start_scan(&state, String::new(), Some("Neck".to_string()))
            .await
            .unwrap();
        assert!(get_scan_result(&state, record.id).await.unwrap().is_none());
        assert_eq!(get_scan_summary(&state).await.unwrap().total, 0);

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_update_config_rejects_invalid_retention() {
        let (_dir, state) = setup().await;

        let result = update_config(
            &state,
            AppConfig {
                retention_days: Some(Some(0)),
                auto_save_scans: Some(false),
                ..Default::default()
            },
        )
        .await;
        assert!(result.is_err());

        // 校验失败时配置不变
        let config = get_app_config(&state).await.unwrap();
        assert!(config.auto_save_scans);
        assert_eq!(config.retention_days, None);
        assert!(!state.has_cleanup_task().await);

        update_config(
            &state,
            AppConfig {
                retention_days: Some(Some(30)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(state.has_cleanup_task().await);
        assert_eq!(state.cleaner.get_retention_days().await, Some(30));

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_null_retention_from_json_turns_cleanup_off() {
        let (_dir, state) = setup().await;

        let enable: AppConfig = serde_json::from_str(r#"{"retention_days": 14}"#).unwrap();
        update_config(&state, enable).await.unwrap();
        assert!(state.has_cleanup_task().await);
        assert_eq!(state.cleaner.get_retention_days().await, Some(14));

        let disable: AppConfig = serde_json::from_str(r#"{"retention_days": null}"#).unwrap();
        assert_eq!(disable.retention_days, Some(None));
        let updated = update_config(&state, disable).await.unwrap();

        assert_eq!(updated.retention_days, None);
        assert_eq!(state.cleaner.get_retention_days().await, None);
        assert!(!state.has_cleanup_task().await);

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_settings_write_leaves_runtime_untouched() {
        let (dir, state) = setup().await;

        // 配置文件位置被目录占用，写入必然失败
        let settings_path = dir.path().join("settings.json");
        std::fs::remove_file(&settings_path).unwrap();
        std::fs::create_dir(&settings_path).unwrap();

        let result = update_config(
            &state,
            AppConfig {
                retention_days: Some(Some(30)),
                ..Default::default()
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(state.cleaner.get_retention_days().await, None);
        assert!(!state.has_cleanup_task().await);

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_cancel_scan_when_idle_is_harmless() {
        let (_dir, state) = setup().await;
        cancel_scan(&state);

        let record = start_scan(&state, String::new(), Some("Back".to_string()))
            .await
            .unwrap();
        if record.anomaly_detected {
            assert!(record.bounding_box.is_some());
        } else {
            assert_eq!(record.severity, Severity::Low);
        }

        state.shutdown().await;
    }
}
