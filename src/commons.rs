// system specs

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProtocolKind {
    MSI,
    MESI,
    MOSI,
    MOESI,
}

impl ProtocolKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolKind::MSI => "MSI",
            ProtocolKind::MESI => "MESI",
            ProtocolKind::MOSI => "MOSI",
            ProtocolKind::MOESI => "MOESI",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SystemSpec {
    pub protocol: ProtocolKind,
    pub num_caches: u32,
}

impl Default for SystemSpec {
    fn default() -> Self {
        SystemSpec {
            protocol: ProtocolKind::MESI,
            num_caches: 4,
        }
    }
}

// addresses and cache identities

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Addr(pub u32);

pub type CacheId = u32;

// messages

/// a processor-side access to one block
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProcSignal {
    Read(Addr),
    Write(Addr),
}

impl ProcSignal {
    pub fn addr(&self) -> Addr {
        match self {
            ProcSignal::Read(addr) | ProcSignal::Write(addr) => *addr,
        }
    }
}

/// the bus signals caches can observe, as defined by the protocol family.
/// `BusRd` and `BusRdX` travel with the id of the cache that issued them;
/// `BusData` travels with the id of the cache the reply is addressed to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BusSignal {
    BusRd(Addr),
    BusRdX(Addr),
    BusData(Addr),
}

impl BusSignal {
    pub fn addr(&self) -> Addr {
        match self {
            BusSignal::BusRd(addr) | BusSignal::BusRdX(addr) | BusSignal::BusData(addr) => *addr,
        }
    }
}
