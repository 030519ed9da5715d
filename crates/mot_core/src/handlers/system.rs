//! Handler `system-stats`: métricas do próprio host via `sysinfo`.
//!
//! Parâmetros:
//! - `metrics`: lista de métricas, na ordem dos campos do sensor
//!   (`cpu_usage`, `cpu_temp`, `ram_percent`, `ram_used_gb`, `ram_total_gb`)
//! - `poll_interval`, `report_unchanged`: como em `file-poll`
//!
//! Valores são arredondados para uma casa decimal, para que
//! `report_unchanged = false` tenha efeito com métricas ruidosas.

use super::{PollSettings, Sampler};
use crate::types::Reading;
use serde::Deserialize;
use sysinfo::{Components, CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

#[derive(Debug, Clone, Deserialize)]
pub struct SystemStatsParams {
    pub metrics: Vec<String>,
    #[serde(flatten)]
    pub poll: PollSettings,
}

/// Uma métrica do host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Uso total da CPU (0–100%)
    CpuUsage,
    /// Maior temperatura de CPU reportada pelos componentes (°C)
    CpuTemp,
    /// Percentual de RAM em uso
    RamPercent,
    /// RAM usada (GB)
    RamUsedGb,
    /// RAM total (GB)
    RamTotalGb,
}

impl Metric {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "cpu_usage" => Some(Metric::CpuUsage),
            "cpu_temp" => Some(Metric::CpuTemp),
            "ram_percent" => Some(Metric::RamPercent),
            "ram_used_gb" => Some(Metric::RamUsedGb),
            "ram_total_gb" => Some(Metric::RamTotalGb),
            _ => None,
        }
    }
}

pub struct SystemStatsSampler {
    metrics: Vec<Metric>,
    sys: System,
    components: Components,
}

impl SystemStatsSampler {
    /// Cria o sampler; nome de métrica desconhecido é erro.
    pub fn new(names: &[String]) -> Result<Self, String> {
        let metrics = names
            .iter()
            .map(|n| Metric::parse(n).ok_or_else(|| format!("métrica desconhecida '{n}'")))
            .collect::<Result<Vec<_>, _>>()?;

        let mut sys = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        // Primeira leitura para inicializar contadores de CPU
        sys.refresh_cpu_all();

        Ok(Self {
            metrics,
            sys,
            components: Components::new_with_refreshed_list(),
        })
    }

    /// Busca a temperatura da CPU nos components do sysinfo.
    fn cpu_temp_from_components(&self) -> f32 {
        let mut temp = 0.0_f32;
        for comp in self.components.iter() {
            let label = comp.label().to_lowercase();
            if label.contains("cpu")
                || label.contains("tctl")
                || label.contains("tdie")
                || label.contains("package")
                || label.contains("core")
            {
                if let Some(t) = comp.temperature() {
                    if t > temp && t < 150.0 {
                        temp = t;
                    }
                }
            }
        }
        temp
    }

    fn value(&self, metric: Metric) -> f64 {
        const GB: f64 = 1024.0 * 1024.0 * 1024.0;
        let total = self.sys.total_memory() as f64;
        let used = self.sys.used_memory() as f64;

        match metric {
            Metric::CpuUsage => self.sys.global_cpu_usage() as f64,
            Metric::CpuTemp => self.cpu_temp_from_components() as f64,
            Metric::RamPercent => {
                if total > 0.0 {
                    used / total * 100.0
                } else {
                    0.0
                }
            }
            Metric::RamUsedGb => used / GB,
            Metric::RamTotalGb => total / GB,
        }
    }
}

impl Sampler for SystemStatsSampler {
    fn width(&self) -> usize {
        self.metrics.len()
    }

    fn sample(&mut self) -> Result<Reading, String> {
        self.sys.refresh_cpu_all();
        self.sys.refresh_memory();
        if self.metrics.contains(&Metric::CpuTemp) {
            self.components.refresh(true);
        }

        Ok(self
            .metrics
            .iter()
            .map(|m| (self.value(*m) * 10.0).round() / 10.0)
            .collect())
    }
}
