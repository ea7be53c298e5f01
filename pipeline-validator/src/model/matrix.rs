// Matrix Strategy Expansion
// Expands matrix and parallel strategies into concrete job instances

use crate::expression::Value;
use crate::model::error::ModelError;
use crate::model::pipeline::Strategy;

use indexmap::IndexMap;

/// One concrete copy of a job produced by its strategy
#[derive(Debug, Clone, PartialEq)]
pub struct JobInstance {
    /// Instance name: `Build_linux` for matrix cells, `Build_2` for parallel copies
    pub name: String,
    /// Name of the job this instance was expanded from
    pub job: String,
    /// Variables specific to this instance
    pub variables: IndexMap<String, Value>,
}

/// Matrix expander for job strategies
pub struct MatrixExpander;

impl MatrixExpander {
    /// Expand a job's strategy into its instances, in cell order.
    /// Jobs without a multiplying strategy yield one instance named after the job.
    pub fn expand(job: &str, strategy: &Strategy, limit: usize) -> Result<Vec<JobInstance>, ModelError> {
        let instances = match strategy {
            Strategy::Matrix { cells, .. } if !cells.is_empty() => Self::expand_matrix(job, cells, limit)?,
            Strategy::Parallel { count } if *count > 0 => Self::expand_parallel(job, *count as usize, limit)?,
            _ => vec![JobInstance {
                name: job.to_string(),
                job: job.to_string(),
                variables: IndexMap::new(),
            }],
        };
        Ok(instances)
    }

    fn expand_matrix(
        job: &str,
        cells: &IndexMap<String, IndexMap<String, Value>>,
        limit: usize,
    ) -> Result<Vec<JobInstance>, ModelError> {
        Self::check_limit(job, cells.len(), limit)?;
        Ok(cells
            .iter()
            .map(|(cell, variables)| JobInstance {
                name: format!("{}_{}", job, cell),
                job: job.to_string(),
                variables: variables.clone(),
            })
            .collect())
    }

    fn expand_parallel(job: &str, count: usize, limit: usize) -> Result<Vec<JobInstance>, ModelError> {
        Self::check_limit(job, count, limit)?;
        Ok((1..=count)
            .map(|position| {
                let mut variables = IndexMap::new();
                variables.insert(
                    "System.JobPositionInPhase".to_string(),
                    Value::Number(position as f64),
                );
                variables.insert(
                    "System.TotalJobsInPhase".to_string(),
                    Value::Number(count as f64),
                );
                JobInstance {
                    name: format!("{}_{}", job, position),
                    job: job.to_string(),
                    variables,
                }
            })
            .collect())
    }

    fn check_limit(job: &str, count: usize, limit: usize) -> Result<(), ModelError> {
        if count > limit {
            return Err(ModelError::TooManyInstances {
                job: job.to_string(),
                count,
                limit,
            });
        }
        Ok(())
    }
}
