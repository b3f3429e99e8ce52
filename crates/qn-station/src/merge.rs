//! How a group of clients selected together is forwarded.

use qn_client::Client;
use qn_core::{ClientId, ClientTypeId, QnError, QnResult, StationId};

use crate::RunContext;

/// Forwarding mode of a group.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Every member is forwarded on its own, in the same instant.
    #[default]
    Collect,
    /// Members become sub-entities of a new client of type `target`.
    Temporary { target: ClientTypeId },
    /// Members are disposed and replaced by a new client of type `target`.
    Permanent { target: ClientTypeId },
}

/// How member values are combined into the merged client.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum DataTransferMode {
    /// The merged client starts from zero.
    #[default]
    Off,
    Min,
    Max,
    Mean,
    Sum,
    Multiply,
}

impl DataTransferMode {
    /// Combine `values`.  `None` for [`Off`][Self::Off] or no values.
    pub fn combine(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let it = values.iter().copied();
        match self {
            DataTransferMode::Off      => None,
            DataTransferMode::Min      => Some(it.fold(f64::INFINITY, f64::min)),
            DataTransferMode::Max      => Some(it.fold(f64::NEG_INFINITY, f64::max)),
            DataTransferMode::Mean     => Some(it.sum::<f64>() / values.len() as f64),
            DataTransferMode::Sum      => Some(it.sum()),
            DataTransferMode::Multiply => Some(it.product()),
        }
    }
}

/// Merge mode plus data transfer settings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct MergeRule {
    pub mode:    MergeMode,
    /// Applied to waiting, transfer, process and residence times.
    pub times:   DataTransferMode,
    /// Applied slot by slot to numeric user data.
    pub numbers: DataTransferMode,
}

impl MergeRule {
    pub fn collect() -> Self {
        Self::default()
    }

    pub fn temporary(target: ClientTypeId) -> Self {
        Self { mode: MergeMode::Temporary { target }, ..Self::default() }
    }

    pub fn permanent(target: ClientTypeId) -> Self {
        Self { mode: MergeMode::Permanent { target }, ..Self::default() }
    }

    pub fn with_times(mut self, mode: DataTransferMode) -> Self {
        self.times = mode;
        self
    }

    pub fn with_numbers(mut self, mode: DataTransferMode) -> Self {
        self.numbers = mode;
        self
    }

    pub fn target(&self) -> Option<ClientTypeId> {
        match self.mode {
            MergeMode::Collect => None,
            MergeMode::Temporary { target } | MergeMode::Permanent { target } => Some(target),
        }
    }
}

/// Values carried over from the members to the merged client.
struct Carry {
    times:      [Option<u64>; 4],
    numbers:    Option<Vec<f64>>,
    is_last:    bool,
    is_warm_up: bool,
}

impl Carry {
    fn gather(rule: &MergeRule, members: &[&Client]) -> Self {
        let ticks = |f: fn(&Client) -> u64| {
            let values: Vec<f64> = members.iter().map(|c| f(c) as f64).collect();
            rule.times.combine(&values).map(|v| v.round().max(0.0) as u64)
        };
        let numbers = (rule.numbers != DataTransferMode::Off).then(|| {
            let width = members.iter().map(|c| c.user_data.number_len()).max().unwrap_or(0);
            (0..width)
                .map(|i| {
                    let values: Vec<f64> = members.iter().map(|c| c.user_data.number(i)).collect();
                    rule.numbers.combine(&values).unwrap_or(0.0)
                })
                .collect()
        });
        Self {
            times: [
                ticks(|c| c.waiting_time),
                ticks(|c| c.transfer_time),
                ticks(|c| c.process_time),
                ticks(|c| c.residence_time),
            ],
            numbers,
            is_last:    members.iter().any(|c| c.is_last_client),
            is_warm_up: members.iter().all(|c| c.is_warm_up),
        }
    }

    fn apply(self, client: &mut Client) {
        let [waiting, transfer, process, residence] = self.times;
        client.waiting_time = waiting.unwrap_or(0);
        client.transfer_time = transfer.unwrap_or(0);
        client.process_time = process.unwrap_or(0);
        client.residence_time = residence.unwrap_or(0);
        if let Some(numbers) = self.numbers {
            client.user_data.set_numbers(numbers);
        }
        client.is_last_client = self.is_last;
        client.is_warm_up = self.is_warm_up;
    }
}

/// Turn `members` into the clients to forward according to `rule`.
///
/// Members must already be out of every waiting structure.
pub fn merge_group(rule: &MergeRule, members: Vec<ClientId>, ctx: &mut RunContext<'_, '_>) -> QnResult<Vec<ClientId>> {
    let Some(target) = rule.target() else {
        return Ok(members);
    };
    if members.is_empty() {
        return Ok(members);
    }
    let carry = {
        let records = members.iter().map(|&id| ctx.client(id)).collect::<QnResult<Vec<_>>>()?;
        Carry::gather(rule, &records)
    };

    let now = ctx.now();
    let merged = ctx.clients.create(target, now);
    carry.apply(ctx.client_mut(merged)?);

    match rule.mode {
        MergeMode::Temporary { .. } => {
            for id in members {
                let original = ctx.clients.detach(id).ok_or(QnError::ClientNotFound(id))?;
                ctx.client_mut(merged)?.add_batch_member(original);
            }
        }
        MergeMode::Permanent { .. } => {
            for id in members {
                ctx.dispose_client(id)?;
            }
        }
        MergeMode::Collect => {}
    }
    Ok(vec![merged])
}

/// [`merge_group`], then end the stay of every resulting client at
/// `station` in the current instant.
pub fn release_group(
    station: StationId,
    rule:    &MergeRule,
    members: Vec<ClientId>,
    ctx:     &mut RunContext<'_, '_>,
) -> QnResult<Vec<ClientId>> {
    let released = merge_group(rule, members, ctx)?;
    for &id in &released {
        ctx.leave_now(station, id);
    }
    Ok(released)
}
