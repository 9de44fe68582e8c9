//! Stage reconciler
//!
//! Creates one Task per task in the stage snapshot and folds the task
//! phases back into the stage phase.

use async_trait::async_trait;
use gantry_core::domain::{Kind, ObjectKey, ObjectMeta, Phase, Stage, Task, TaskSpec};
use gantry_core::identity::task_name;
use gantry_store::StoreExt;
use tracing::{debug, info};

use super::{ControllerContext, ReconcileError, ReconcileResult, Reconciler, Trigger};

pub struct StageReconciler {
    ctx: ControllerContext,
}

impl StageReconciler {
    pub fn new(ctx: ControllerContext) -> Self {
        Self { ctx }
    }

    async fn write_phase(&self, mut stage: Stage, phase: Phase) -> ReconcileResult<Stage> {
        let key = stage.metadata.key();
        let previous = stage.status.phase;
        stage.status.phase = Some(phase);
        let stage = self.ctx.store.update_resource(stage).await?;
        info!(stage = %key, ?previous, %phase, "Stage phase changed");
        Ok(stage)
    }
}

#[async_trait]
impl Reconciler for StageReconciler {
    fn kind(&self) -> Kind {
        Kind::Stage
    }

    fn triggers(&self) -> Vec<Trigger> {
        vec![Trigger::Owned(Kind::Task)]
    }

    async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<()> {
        let Some(mut stage) = self.ctx.store.fetch::<Stage>(key).await? else {
            debug!(stage = %key, "Stage no longer exists");
            return Ok(());
        };

        let current = stage.status.phase;
        match current {
            None => stage = self.write_phase(stage, Phase::InProgress).await?,
            Some(phase) if phase.is_terminal() => return Ok(()),
            Some(_) => {}
        }

        let mut phases = Vec::with_capacity(stage.spec.config.tasks.len());
        for (template_task, config) in &stage.spec.config.tasks {
            let ordinal = stage.spec.ordinal;
            let task = Task {
                metadata: ObjectMeta::new(
                    key.namespace.clone(),
                    task_name(&key.name, template_task, ordinal),
                )
                .with_owner(Kind::Stage, key.name.clone()),
                spec: TaskSpec {
                    stage: key.name.clone(),
                    template_task: template_task.clone(),
                    ordinal,
                    config: Some(config.clone()),
                },
                status: Default::default(),
            };

            let (task, created) = self.ctx.store.get_or_create(task).await?;
            if created {
                info!(stage = %key, task = %task.metadata.name, "Created task");
            } else if !task.is_for(&key.name, template_task, ordinal) {
                return Err(ReconcileError::InvalidConfig(format!(
                    "task {} belongs to stage '{}' task '{}', not to stage {}",
                    task.metadata.name, task.spec.stage, task.spec.template_task, key
                )));
            }
            phases.push(task.status.phase);
        }

        let aggregate = Phase::aggregate(phases);
        if let Some(next) = Phase::advance(stage.status.phase, aggregate) {
            self.write_phase(stage, next).await?;
        }

        Ok(())
    }
}
