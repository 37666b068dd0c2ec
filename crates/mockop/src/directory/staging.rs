use crate::directory::ResponseDirectory;
use crate::error::{MockError, MockResult};
use crate::model::CommandInvocation;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A batch of records that lands in the directory together or not at all.
///
/// Records are only checked and inserted at [`Staging::commit`]; dropping the
/// batch discards them and leaves the directory untouched.
#[derive(Debug)]
pub struct Staging<'a> {
    directory: &'a mut ResponseDirectory,
    staged: Vec<(CommandInvocation, bool)>,
}

impl<'a> Staging<'a> {
    pub(super) fn new(directory: &'a mut ResponseDirectory) -> Self {
        Self {
            directory,
            staged: Vec::new(),
        }
    }

    /// Queue a record for the batch.
    pub fn stage(&mut self, invocation: CommandInvocation, overwrite: bool) -> &mut Self {
        self.staged.push((invocation, overwrite));
        self
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Validate every staged record, then insert them all and save once.
    pub fn commit(self) -> MockResult<()> {
        let Self { directory, staged } = self;
        Self::validate(directory, &staged)?;
        let count = staged.len();
        let index = directory.index.clone();
        let pending = directory.pending.clone();
        let result = staged
            .into_iter()
            .try_for_each(|(invocation, overwrite)| {
                directory.add_command_invocation(invocation, overwrite, false)
            })
            .and_then(|()| directory.save());
        if let Err(err) = result {
            directory.index = index;
            directory.pending = pending;
            debug!(records = count, error = %err, "staged batch rolled back");
            return Err(err);
        }
        debug!(records = count, "staged batch committed");
        Ok(())
    }

    /// Check each record against the directory and against the rest of the batch.
    fn validate(directory: &ResponseDirectory, staged: &[(CommandInvocation, bool)]) -> MockResult<()> {
        let mut slots: HashMap<(Option<String>, String), &str> = HashMap::new();
        let mut names: HashSet<&str> = HashSet::new();
        for (invocation, overwrite) in staged {
            directory.check_add(invocation, *overwrite)?;
            let slot = (
                invocation.input_digest().map(|digest| digest.to_string()),
                invocation.fingerprint(),
            );
            if let Some(first) = slots.insert(slot.clone(), invocation.label()) {
                return Err(MockError::duplicate_response(
                    "command staged twice in one batch",
                    serde_json::json!({
                        "command": slot.1,
                        "input_digest": slot.0,
                        "names": [first, invocation.label()],
                    }),
                ));
            }
            if !names.insert(invocation.label()) {
                return Err(MockError::duplicate_response(
                    "record name staged twice in one batch",
                    serde_json::json!({ "name": invocation.label() }),
                ));
            }
        }
        Ok(())
    }
}
