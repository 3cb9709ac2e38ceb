use std::{io::Write, sync::Arc};

use crate::repository::interface::{Error as RepositoryError, Repository};

#[derive(Debug, thiserror::Error)]
pub enum OneOffError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Error serializing a result row: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Error writing the results: {0}")]
    Io(#[from] std::io::Error),
}

// Run a one-off command and output its results to a writer, one JSON object per row.
// The command may hold several statements; their rows are written in order.
pub async fn run_one_off_command<W>(
    repository: Arc<dyn Repository>,
    command: &str,
    mut output: W,
) -> Result<(), OneOffError>
where
    W: Write,
{
    if command.trim().is_empty() {
        return Ok(());
    }

    for row in repository.execute_query(command).await? {
        serde_json::to_writer(&mut output, &row)?;
        output.write_all(b"\n")?;
    }
    output.flush()?;
    Ok(())
}
