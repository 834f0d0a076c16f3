//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic `/proc` states for the network
//! collectors. Values are small round numbers so assertions stay readable.

use super::filesystem::MockFs;

/// `/proc/net/snmp` with `Tcp: ActiveOpens=10 PassiveOpens=5 CurrEstab=2 RetransSegs=5`
/// and `Udp: InDatagrams=500 OutDatagrams=400 InErrors=5 NoPorts=10 RcvbufErrors=2`.
pub const NET_SNMP: &str = "\
Ip: Forwarding DefaultTTL InReceives InHdrErrors InAddrErrors ForwDatagrams InUnknownProtos InDiscards InDelivers OutRequests
Ip: 1 64 1000000 0 0 0 0 0 999900 800000
Icmp: InMsgs InErrors InCsumErrors InDestUnreachs
Icmp: 45 0 0 45
Tcp: RtoAlgorithm RtoMin RtoMax MaxConn ActiveOpens PassiveOpens AttemptFails EstabResets CurrEstab InSegs OutSegs RetransSegs InErrs OutRsts InCsumErrors
Tcp: 1 200 120000 -1 10 5 0 0 2 1000 900 5 0 3 0
Udp: InDatagrams NoPorts InErrors OutDatagrams RcvbufErrors SndbufErrors InCsumErrors IgnoredMulti MemErrors
Udp: 500 10 5 400 2 0 0 0 0
UdpLite: InDatagrams NoPorts InErrors OutDatagrams RcvbufErrors SndbufErrors InCsumErrors IgnoredMulti MemErrors
UdpLite: 0 0 0 0 0 0 0 0 0
";

/// `/proc/net/dev` with `lo` and `eth0` (eth0: rx 5000 bytes, tx 2000 bytes).
pub const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:    1200      12    0    0    0     0          0         0     1200      12    0    0    0     0       0          0
  eth0:    5000      50    1    2    0     0          0         3     2000      20    3    4    0     0       0          0
";

/// `/proc/net/softnet_stat` for two CPUs, each processed=0x64 dropped=0x1 squeezed=0x2.
pub const SOFTNET_STAT: &str = "\
00000064 00000001 00000002 00000000 00000000 00000000 00000000 00000000 00000000 00000000 00000000 00000000 00000000
00000064 00000001 00000002 00000000 00000000 00000000 00000000 00000000 00000000 00000000 00000000 00000000 00000001
";

/// `/proc/net/wireless` with `wlan0` at link quality 50 and signal level -40 dBm.
pub const NET_WIRELESS: &str = "\
Inter-| sta-|   Quality        |   Discarded packets               | Missed | WE
 face | tus | link level noise |  nwid  crypt   frag  retry   misc | beacon | 22
 wlan0: 0000   50.  -40.  -256        0      0      0      0      0        0
";

/// `/proc/net/sockstat` with used=100, TCP inuse=10, UDP inuse=5.
pub const NET_SOCKSTAT: &str = "\
sockets: used 100
TCP: inuse 10 orphan 0 tw 2 alloc 12 mem 3
UDP: inuse 5 mem 1
UDPLITE: inuse 0
RAW: inuse 0
FRAG: inuse 0 memory 0
";

impl MockFs {
    /// Creates a host with every network source the collectors know about.
    ///
    /// Includes: SNMP tables, two interfaces, two CPUs of softnet data,
    /// conntrack count=123 / max=65536, one wireless interface and sockstat.
    pub fn network_host() -> Self {
        let fs = Self::new();
        fs.add_file("/proc/net/snmp", NET_SNMP);
        fs.add_file("/proc/net/dev", NET_DEV);
        fs.add_file("/proc/net/softnet_stat", SOFTNET_STAT);
        fs.add_file("/proc/net/wireless", NET_WIRELESS);
        fs.add_file("/proc/net/sockstat", NET_SOCKSTAT);
        fs.add_file("/proc/sys/net/netfilter/nf_conntrack_count", "123\n");
        fs.add_file("/proc/sys/net/netfilter/nf_conntrack_max", "65536\n");
        fs
    }

    /// Creates a container-like host: no conntrack module, no wireless.
    pub fn minimal_container() -> Self {
        let fs = Self::new();
        fs.add_file("/proc/net/snmp", NET_SNMP);
        fs.add_file("/proc/net/dev", NET_DEV);
        fs.add_file("/proc/net/softnet_stat", SOFTNET_STAT);
        fs.add_file("/proc/net/sockstat", NET_SOCKSTAT);
        fs.add_dir("/proc/sys/net");
        fs
    }
}
