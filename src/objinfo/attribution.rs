//! Parser for the `(pid: handles[: addr ...])` groups trailing an object line.

/// Upper bound on user-space addresses tracked per object for the target
/// process. Further addresses are dropped.
pub const MAX_USER_ADDRESSES: usize = 16;

/// One parenthesized group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributionGroup {
    /// `None` when the pid column does not parse.
    pub owner_pid: Option<u32>,
    pub user_addresses: Vec<u64>,
}

impl AttributionGroup {
    /// Sharing slots this group contributes: one per address, or one for a
    /// handle without a resolvable address.
    pub fn slots(&self) -> u64 {
        self.user_addresses.len().max(1) as u64
    }
}

/// Sharing information of one object as seen from the target process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribution {
    pub shared_count: u64,
    /// Addresses of the target process, ascending, at most
    /// [`MAX_USER_ADDRESSES`].
    pub user_addresses: Vec<u64>,
    /// Addresses of the target process beyond the cap.
    pub dropped_addresses: usize,
    /// Whether any group names the target process.
    pub owned: bool,
}

fn parse_address(token: &str) -> Option<u64> {
    let hex = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    match u64::from_str_radix(hex, 16) {
        // A zero address means the handle is not mapped.
        Ok(0) | Err(_) => None,
        Ok(addr) => Some(addr),
    }
}

fn parse_group(body: &str) -> AttributionGroup {
    let (pid, tail) = match body.split_once(':') {
        Some((pid, tail)) => (pid, tail),
        None => (body, ""),
    };

    let mut tokens = tail
        .split(|c: char| c == ':' || c.is_whitespace())
        .filter(|t| !t.is_empty());
    // Handle count column
    tokens.next();

    AttributionGroup {
        owner_pid: pid.trim().parse().ok(),
        user_addresses: tokens.filter_map(parse_address).collect(),
    }
}

/// Splits the text after the flags into its attribution groups. An
/// unterminated final group runs to the end of the line.
pub fn parse_groups(rest: &str) -> Vec<AttributionGroup> {
    let mut groups = Vec::new();
    let mut remaining = rest;

    while let Some(open) = remaining.find('(') {
        let after = &remaining[open + 1..];
        let (body, next) = match after.find(')') {
            Some(close) => (&after[..close], &after[close + 1..]),
            None => (after, ""),
        };
        if !body.trim().is_empty() {
            groups.push(parse_group(body));
        }
        remaining = next;
    }

    groups
}

/// Computes the shared count of an object and the addresses at which `pid`
/// maps it.
pub fn attribute(rest: &str, pid: u32) -> Attribution {
    let mut attribution = Attribution::default();

    for group in parse_groups(rest) {
        attribution.shared_count += group.slots();
        if group.owner_pid != Some(pid) {
            continue;
        }
        attribution.owned = true;
        for addr in group.user_addresses {
            if attribution.user_addresses.len() < MAX_USER_ADDRESSES {
                attribution.user_addresses.push(addr);
            } else {
                attribution.dropped_addresses += 1;
            }
        }
    }

    attribution.user_addresses.sort_unstable();
    attribution
}
