//! Per-core geometry and the collaborator that measures it.

use crate::isolation::CacheDomains;
use kernel_info::limits::{MAX_CORES, MAX_NUMA_NODES};
use kernel_info::{CoreId, NumaNodeId, SocketId};

/// ACPI SLIT distance of a node to itself.
pub const LOCAL_NUMA_DISTANCE: u8 = 10;

/// Physical placement of one core.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CoreGeometry {
    pub online: bool,
    pub socket: SocketId,
    pub caches: CacheDomains,
    pub numa_node: NumaNodeId,
    /// Distance from this core's node to every node, SLIT style.
    pub numa_distance: [u8; MAX_NUMA_NODES],
    pub smt_sibling: Option<CoreId>,
    pub base_freq_mhz: u32,
    pub max_freq_mhz: u32,
    pub freq_scaling: bool,
}

impl CoreGeometry {
    /// An online core on a fixed clock with no SMT sibling.
    #[must_use]
    pub const fn new(
        socket: SocketId,
        caches: CacheDomains,
        numa_node: NumaNodeId,
        numa_distance: [u8; MAX_NUMA_NODES],
    ) -> Self {
        Self {
            online: true,
            socket,
            caches,
            numa_node,
            numa_distance,
            smt_sibling: None,
            base_freq_mhz: 0,
            max_freq_mhz: 0,
            freq_scaling: false,
        }
    }

    #[must_use]
    pub const fn with_smt_sibling(mut self, sibling: CoreId) -> Self {
        self.smt_sibling = Some(sibling);
        self
    }

    #[must_use]
    pub const fn with_frequency(mut self, base_mhz: u32, max_mhz: u32) -> Self {
        self.base_freq_mhz = base_mhz;
        self.max_freq_mhz = max_mhz;
        self
    }

    #[must_use]
    pub const fn with_freq_scaling(mut self, enabled: bool) -> Self {
        self.freq_scaling = enabled;
        self
    }

    #[must_use]
    pub const fn with_online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// Distance row is sane: local distance set and no remote node closer.
    #[must_use]
    pub fn numa_distance_valid(&self, node_count: usize) -> bool {
        let local_index = self.numa_node.index();
        let Some(&local) = self.numa_distance.get(local_index) else {
            return false;
        };
        local != 0
            && self.numa_distance[..node_count.min(MAX_NUMA_NODES)]
                .iter()
                .enumerate()
                .all(|(node, &d)| node == local_index || d >= local)
    }
}

/// Reads the geometry of one core, e.g. from ACPI tables or per-core CPUID.
pub trait CoreProbe {
    /// `None` if nothing is known about this core.
    fn probe_core(&self, core: CoreId) -> Option<CoreGeometry>;
}

impl<P: CoreProbe + ?Sized> CoreProbe for &P {
    fn probe_core(&self, core: CoreId) -> Option<CoreGeometry> {
        (**self).probe_core(core)
    }
}

/// Geometry indexed by core id, as handed over by firmware.
#[derive(Clone, Debug, Default)]
pub struct CoreTable {
    cores: heapless::Vec<CoreGeometry, MAX_CORES>,
}

impl CoreTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cores: heapless::Vec::new(),
        }
    }

    /// Geometry for cores `0..count`, one call per core.
    #[must_use]
    pub fn from_fn(count: usize, mut f: impl FnMut(CoreId) -> CoreGeometry) -> Self {
        let mut table = Self::new();
        for index in 0..count.min(MAX_CORES) {
            if let Some(core) = CoreId::from_index(index) {
                let _ = table.cores.push(f(core));
            }
        }
        table
    }

    /// Append the next core. Returns its id.
    ///
    /// # Errors
    /// Hands the geometry back if the table is full.
    pub fn push(&mut self, geometry: CoreGeometry) -> Result<CoreId, CoreGeometry> {
        let id = CoreId::from_index(self.cores.len()).ok_or(geometry)?;
        self.cores.push(geometry)?;
        Ok(id)
    }

    /// Adjust a recorded core.
    pub fn get_mut(&mut self, core: CoreId) -> Option<&mut CoreGeometry> {
        self.cores.get_mut(core.index())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }
}

impl CoreProbe for CoreTable {
    fn probe_core(&self, core: CoreId) -> Option<CoreGeometry> {
        self.cores.get(core.index()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u32, distance: [u8; MAX_NUMA_NODES]) -> CoreGeometry {
        CoreGeometry::new(
            SocketId::new(0),
            CacheDomains::new(0, 0, 0),
            NumaNodeId::new(n),
            distance,
        )
    }

    #[test]
    fn distance_rows_are_checked() {
        let mut row = [0u8; MAX_NUMA_NODES];
        row[0] = 10;
        row[1] = 21;
        assert!(node(0, row).numa_distance_valid(2));
        assert!(!node(1, row).numa_distance_valid(2));

        row[1] = 0;
        assert!(!node(0, row).numa_distance_valid(2));
        // Entries beyond the node count are not looked at.
        assert!(node(0, row).numa_distance_valid(1));
    }

    #[test]
    fn table_serves_recorded_cores_only() {
        let mut row = [0u8; MAX_NUMA_NODES];
        row[0] = LOCAL_NUMA_DISTANCE;
        let mut table = CoreTable::from_fn(2, |_| node(0, row));
        assert_eq!(table.push(node(0, row)), Ok(CoreId::new(2)));
        assert_eq!(table.len(), 3);
        assert!(table.probe_core(CoreId::new(2)).is_some());
        assert!(table.probe_core(CoreId::new(3)).is_none());

        table.get_mut(CoreId::new(1)).unwrap().freq_scaling = true;
        assert!(table.probe_core(CoreId::new(1)).unwrap().freq_scaling);
    }
}
