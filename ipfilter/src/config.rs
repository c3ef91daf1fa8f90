
use std::{
    fs::File,
    io::{BufRead, BufReader},
    net::Ipv4Addr,
    path::Path,
    str::FromStr,
};

use tracing::{debug, info};

use crate::{cidr::LocalNet, Error, Result, RuleSet};

const LOCAL_NET: &str = "LOCAL_NET";
const BLOCK_INBOUND_TCP_PORT: &str = "BLOCK_INBOUND_TCP_PORT";
const BLOCK_PING_REQ: &str = "BLOCK_PING_REQ";
const BLOCK_IP_ADDR: &str = "BLOCK_IP_ADDR";

/// Rule set under construction, `LOCAL_NET` may show up on any line.
#[derive(Debug, Default)]
struct Loader {
    local_net: Option<LocalNet>,
    block_inbound_echo_request: bool,
    blocked_tcp_ports: Vec<u16>,
    blocked_addresses: Vec<Ipv4Addr>,
}

impl Loader {
    fn apply(&mut self, line: usize, text: &str) -> Result<()> {
        let (keyword, arg) = split_directive(text);
        match keyword {
            "" if arg.is_empty() => {}
            LOCAL_NET => {
                let net = arg.parse::<LocalNet>().map_err(|e| Error::InvalidDirective {
                    line,
                    reason: format!("{LOCAL_NET} {arg:?}: {e}"),
                })?;
                self.local_net = Some(net);
            }
            BLOCK_INBOUND_TCP_PORT => {
                let port = parse_arg(line, keyword, arg)?;
                self.blocked_tcp_ports.push(port);
            }
            BLOCK_PING_REQ => {
                if !arg.is_empty() {
                    return Err(Error::InvalidDirective {
                        line,
                        reason: format!("{BLOCK_PING_REQ} takes no argument, got {arg:?}"),
                    });
                }
                self.block_inbound_echo_request = true;
            }
            BLOCK_IP_ADDR => {
                let addr = parse_arg(line, keyword, arg)?;
                self.blocked_addresses.push(addr);
            }
            _ => {
                return Err(Error::ConfigSyntax {
                    line,
                    text: text.to_string(),
                })
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<RuleSet> {
        let local_net = self.local_net.ok_or(Error::MissingLocalNet)?;
        Ok(RuleSet {
            local_net,
            block_inbound_echo_request: self.block_inbound_echo_request,
            blocked_tcp_ports: self.blocked_tcp_ports,
            blocked_addresses: self.blocked_addresses,
        })
    }
}

// Keyword and argument are separated by a colon or whitespace.
fn split_directive(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.find(|c: char| c == ':' || c.is_whitespace()) {
        Some(at) => {
            let arg = text[at..].trim_start();
            let arg = arg.strip_prefix(':').unwrap_or(arg).trim();
            (&text[..at], arg)
        }
        None => (text, ""),
    }
}

fn parse_arg<T>(line: usize, keyword: &str, arg: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    arg.parse().map_err(|e| Error::InvalidDirective {
        line,
        reason: format!("{keyword} {arg:?}: {e}"),
    })
}

impl RuleSet {
    /// Loads a `RuleSet` from the configuration file at `path`.
    ///
    /// Loading is all-or-nothing: the first bad line fails the whole load, and
    /// so does a file that never sets `LOCAL_NET`.
    ///
    /// # Example
    /// ```no_run
    /// # use ipfilter::RuleSet;
    /// let rules = RuleSet::load("firewall.cfg").unwrap();
    /// ```
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::ConfigNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        let rules = Self::from_reader(BufReader::new(file))?;
        info!(
            config = %path.display(),
            local_net = %rules.local_net,
            "configuration loaded"
        );
        Ok(rules)
    }

    /// Loads a `RuleSet` from configuration lines.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut loader = Loader::default();
        for (idx, text) in reader.lines().enumerate() {
            let text = text?;
            loader.apply(idx + 1, &text)?;
        }
        let rules = loader.finish()?;
        debug!(
            blocked_ports = rules.blocked_tcp_ports.len(),
            blocked_addresses = rules.blocked_addresses.len(),
            block_ping = rules.block_inbound_echo_request,
            "rule set built"
        );
        Ok(rules)
    }
}

impl FromStr for RuleSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_reader(s.as_bytes())
    }
}
