//! `check` 命令 - 不连接事件流，执行一轮空闲检测并打印触发的告警

use crate::checker::PassReport;
use crate::engine::Engine;
use anyhow::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// 打印告警但不发送（调试用）
    #[arg(long)]
    pub dry_run: bool,
}

/// 执行一轮检测，返回触发的告警数
pub async fn handle_check(engine: &Engine) -> Result<usize> {
    let report = engine.checker().run_pass().await;
    print!("{}", render_report(&report));
    Ok(report.alerts.len())
}

/// 渲染检测结果（纯函数，便于测试）
pub fn render_report(report: &PassReport) -> String {
    let mut out = String::new();

    for alert in &report.alerts {
        out.push_str(&format!("ALERT {} (idle {:.0} min)\n", alert.key, alert.idle_minutes));
        for line in alert.text.lines() {
            out.push_str(&format!("  {}\n", line));
        }
        for outcome in &alert.outcomes {
            out.push_str(&format!("  -> {}: {}\n", outcome.channel, outcome.detail()));
        }
    }

    for (key, error) in &report.errors {
        out.push_str(&format!("ERROR {}: {}\n", key, error));
    }

    out.push_str(&format!(
        "Checked {} zone(s), {} alert(s)\n",
        report.evaluated,
        report.alerts.len()
    ));
    out
}
