//! Monitoring hooks for the node hosting the WAL.
//!
//! The host process periodically asks for a [`MonitorReport`] and ships it
//! to the monitor endpoint. Resource figures come from a [`ResourceProbe`]
//! the host supplies; the disk snapshot is pushed in by peers as CBOR.

use crate::error::CoreResult;
use crate::stats::{StatsSnapshot, WalStats};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Report format version.
pub const MONITOR_PROTOCOL: u8 = 1;

/// Space on one volume, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiskSize {
    /// Bytes free for use.
    pub avail: u64,
    /// Bytes in use.
    pub used: u64,
    /// Volume capacity.
    pub total: u64,
}

/// A named directory and the space on its volume.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirUsage {
    /// Directory path.
    pub name: String,
    /// Space on the volume holding it.
    pub size: DiskSize,
}

/// A data directory on a storage tier.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataDirUsage {
    /// Directory path.
    pub name: String,
    /// Storage tier, 0 being the fastest.
    pub level: i32,
    /// Space on the volume holding it.
    pub size: DiskSize,
}

/// Disk usage of a node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiskInfo {
    /// Log directory.
    pub logdir: DirUsage,
    /// Temporary directory.
    pub tempdir: DirUsage,
    /// Data directories.
    pub datadirs: Vec<DataDirUsage>,
}

/// Where reports go, and whether they are sent at all.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Master switch.
    pub enabled: bool,
    /// Monitor host name.
    pub fqdn: String,
    /// Monitor port; 0 means unset.
    pub port: u16,
}

impl MonitorConfig {
    /// Creates an enabled configuration pointing at `fqdn:port`.
    #[must_use]
    pub fn new(fqdn: impl Into<String>, port: u16) -> Self {
        Self {
            enabled: true,
            fqdn: fqdn.into(),
            port,
        }
    }

    /// Whether a report should be composed this cycle.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.fqdn.is_empty() && self.port != 0
    }
}

/// Identity of the reporting node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Node id within the cluster.
    pub dnode_id: i32,
    /// Cluster id.
    pub cluster_id: i64,
    /// Node endpoint, `host:port`.
    pub ep: String,
}

/// CPU figures, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CpuUsage {
    /// Used by this process.
    pub engine: f64,
    /// Used by the whole system.
    pub system: f64,
    /// Logical cores.
    pub cores: f32,
}

/// Memory figures, in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// Resident memory of this process.
    pub engine: u64,
    /// Memory in use system-wide.
    pub system: u64,
    /// Installed memory.
    pub total: u64,
}

/// Network throughput, in bytes per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkUsage {
    /// Received.
    pub bytes_in: f64,
    /// Sent.
    pub bytes_out: f64,
}

/// Process I/O, in bytes per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IoUsage {
    /// Read through the page cache.
    pub read: f64,
    /// Written through the page cache.
    pub write: f64,
    /// Read from disk.
    pub read_disk: f64,
    /// Written to disk.
    pub write_disk: f64,
}

/// Host-supplied resource readings.
pub trait ResourceProbe {
    /// Days since the process started.
    fn uptime_days(&self) -> f64;

    /// Current CPU usage.
    fn cpu(&self) -> CpuUsage;

    /// Current memory usage.
    fn memory(&self) -> MemoryUsage;

    /// Space on the data volume.
    fn data_disk(&self) -> DiskSize;

    /// Current network throughput.
    fn network(&self) -> NetworkUsage;

    /// Current process I/O.
    fn io(&self) -> IoUsage;
}

/// Report header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicInfo {
    /// Always [`MONITOR_PROTOCOL`].
    pub protocol: u8,
    /// Node id within the cluster.
    pub dnode_id: i32,
    /// Cluster id.
    pub cluster_id: i64,
    /// Node endpoint.
    pub dnode_ep: String,
}

/// Resource section of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Days since the process started.
    pub uptime: f64,
    /// CPU used by this process.
    pub cpu_engine: f64,
    /// CPU used system-wide.
    pub cpu_system: f64,
    /// Logical cores.
    pub cpu_cores: f32,
    /// Resident memory of this process.
    pub mem_engine: u64,
    /// Memory in use system-wide.
    pub mem_system: u64,
    /// Installed memory.
    pub mem_total: u64,
    /// Bytes used by this process on the data volume.
    pub disk_engine: u64,
    /// Bytes in use on the data volume.
    pub disk_used: u64,
    /// Data volume capacity.
    pub disk_total: u64,
    /// Network bytes received per second.
    pub net_in: f64,
    /// Network bytes sent per second.
    pub net_out: f64,
    /// Bytes read per second.
    pub io_read: f64,
    /// Bytes written per second.
    pub io_write: f64,
    /// Bytes read from disk per second.
    pub io_read_disk: f64,
    /// Bytes written to disk per second.
    pub io_write_disk: f64,
}

impl NodeInfo {
    fn from_probe(probe: &dyn ResourceProbe) -> Self {
        let cpu = probe.cpu();
        let memory = probe.memory();
        let disk = probe.data_disk();
        let network = probe.network();
        let io = probe.io();
        Self {
            uptime: probe.uptime_days(),
            cpu_engine: cpu.engine,
            cpu_system: cpu.system,
            cpu_cores: cpu.cores,
            mem_engine: memory.engine,
            mem_system: memory.system,
            mem_total: memory.total,
            disk_engine: 0,
            disk_used: disk.used,
            disk_total: disk.total,
            net_in: network.bytes_in,
            net_out: network.bytes_out,
            io_read: io.read,
            io_write: io.write,
            io_read_disk: io.read_disk,
            io_write_disk: io.write_disk,
        }
    }
}

/// One monitoring cycle's worth of data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorReport {
    /// Header.
    pub basic: BasicInfo,
    /// Resource readings.
    pub node: NodeInfo,
    /// Disk usage snapshot.
    pub disk: DiskInfo,
    /// WAL request counters.
    pub wal: StatsSnapshot,
}

impl MonitorReport {
    /// Serializes the report as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Json`](crate::CoreError::Json) if serialization
    /// fails.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// State the monitor reads from between cycles.
#[derive(Debug)]
pub struct MonitorHooks {
    disk: RwLock<DiskInfo>,
    wal_stats: Arc<WalStats>,
}

impl MonitorHooks {
    /// Creates hooks reporting the given WAL counters.
    #[must_use]
    pub fn new(wal_stats: Arc<WalStats>) -> Self {
        Self {
            disk: RwLock::new(DiskInfo::default()),
            wal_stats,
        }
    }

    /// Copy of the current disk snapshot.
    #[must_use]
    pub fn disk_info(&self) -> DiskInfo {
        self.disk.read().clone()
    }

    /// Replaces the disk snapshot with one decoded from CBOR.
    ///
    /// Undecodable input is logged and dropped; the previous snapshot stays.
    pub fn set_disk_info(&self, bytes: &[u8]) {
        match tidewal_codec::from_cbor::<DiskInfo>(bytes) {
            Ok(info) => *self.disk.write() = info,
            Err(e) => tracing::error!(error = %e, "failed to parse disk info"),
        }
    }

    /// Builds this cycle's report, or `None` if reporting is off or the
    /// endpoint is unset.
    #[must_use]
    pub fn compose_report(
        &self,
        config: &MonitorConfig,
        identity: &NodeIdentity,
        probe: &dyn ResourceProbe,
    ) -> Option<MonitorReport> {
        if !config.is_active() {
            return None;
        }
        tracing::trace!(fqdn = %config.fqdn, port = config.port, "composing monitor report");

        Some(MonitorReport {
            basic: BasicInfo {
                protocol: MONITOR_PROTOCOL,
                dnode_id: identity.dnode_id,
                cluster_id: identity.cluster_id,
                dnode_ep: identity.ep.clone(),
            },
            node: NodeInfo::from_probe(probe),
            disk: self.disk_info(),
            wal: self.wal_stats.snapshot(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe;

    impl ResourceProbe for FixedProbe {
        fn uptime_days(&self) -> f64 {
            1.5
        }

        fn cpu(&self) -> CpuUsage {
            CpuUsage {
                engine: 12.5,
                system: 40.0,
                cores: 8.0,
            }
        }

        fn memory(&self) -> MemoryUsage {
            MemoryUsage {
                engine: 1024,
                system: 4096,
                total: 16384,
            }
        }

        fn data_disk(&self) -> DiskSize {
            DiskSize {
                avail: 70,
                used: 30,
                total: 100,
            }
        }

        fn network(&self) -> NetworkUsage {
            NetworkUsage::default()
        }

        fn io(&self) -> IoUsage {
            IoUsage {
                read: 1.0,
                write: 2.0,
                read_disk: 3.0,
                write_disk: 4.0,
            }
        }
    }

    fn identity() -> NodeIdentity {
        NodeIdentity {
            dnode_id: 3,
            cluster_id: 77,
            ep: "node3:6030".to_string(),
        }
    }

    fn sample_disk() -> DiskInfo {
        DiskInfo {
            logdir: DirUsage {
                name: "/var/log/tidewal".to_string(),
                size: DiskSize {
                    avail: 1,
                    used: 2,
                    total: 3,
                },
            },
            tempdir: DirUsage::default(),
            datadirs: vec![DataDirUsage {
                name: "/data0".to_string(),
                level: 0,
                size: DiskSize::default(),
            }],
        }
    }

    #[test]
    fn report_skipped_when_unconfigured() {
        let hooks = MonitorHooks::new(Arc::new(WalStats::new()));
        let probe = FixedProbe;

        let disabled = MonitorConfig {
            enabled: false,
            ..MonitorConfig::new("monitor", 6043)
        };
        assert!(hooks.compose_report(&disabled, &identity(), &probe).is_none());
        assert!(hooks
            .compose_report(&MonitorConfig::new("", 6043), &identity(), &probe)
            .is_none());
        assert!(hooks
            .compose_report(&MonitorConfig::new("monitor", 0), &identity(), &probe)
            .is_none());
    }

    #[test]
    fn report_carries_all_sections() {
        let stats = Arc::new(WalStats::new());
        stats.record_append(10);
        let hooks = MonitorHooks::new(Arc::clone(&stats));
        hooks.set_disk_info(&tidewal_codec::to_cbor(&sample_disk()).unwrap());

        let report = hooks
            .compose_report(&MonitorConfig::new("monitor", 6043), &identity(), &FixedProbe)
            .unwrap();
        assert_eq!(report.basic.protocol, 1);
        assert_eq!(report.basic.dnode_ep, "node3:6030");
        assert_eq!(report.node.cpu_cores, 8.0);
        assert_eq!(report.node.disk_used, 30);
        assert_eq!(report.node.disk_engine, 0);
        assert_eq!(report.disk, sample_disk());
        assert_eq!(report.wal.appends, 1);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["basic"]["cluster_id"], 77);
        assert_eq!(json["wal"]["bytes_appended"], 10);
        assert_eq!(json["disk"]["datadirs"][0]["name"], "/data0");
    }

    #[test]
    fn malformed_disk_info_keeps_previous_snapshot() {
        let hooks = MonitorHooks::new(Arc::new(WalStats::new()));
        hooks.set_disk_info(&tidewal_codec::to_cbor(&sample_disk()).unwrap());

        hooks.set_disk_info(&[0xff, 0x00, 0x13]);
        assert_eq!(hooks.disk_info(), sample_disk());
    }
}
