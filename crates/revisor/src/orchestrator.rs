//! Batch sequencing: install, remove and plan over a list of groups.
//!
//! Groups run one at a time, in input order. Inside a group, structure goes
//! before triggers and the root before its children. A failure stops its own
//! group only: the report records it and the batch moves on.

use revisor_sql::{
    AlterOp, AlterTable, DropTable, DropTrigger, Render, RenderContext, Stmt, TableName,
    render_with,
};
use tracing::{Instrument, info, info_span, warn};

use crate::builder::build_group;
use crate::executor::{DryRun, Executor};
use crate::introspect::Introspector;
use crate::model::{GroupSpec, TableGroup};
use crate::names::{self, TriggerKind};
use crate::options::Options;
use crate::triggers::TriggerSynthesizer;
use crate::{Error, SchemaError, ddl};

/// How a group fared.
#[derive(Debug)]
pub enum GroupOutcome {
    Done,
    /// The group could not be modelled; nothing was executed for it.
    Skipped(SchemaError),
    /// A statement (or catalog query) failed. Statements that ran before it
    /// stay applied.
    Failed(Error),
}

/// The result for one group of a batch.
#[derive(Debug)]
pub struct GroupReport {
    pub root: TableName,
    /// Whether the root's storage was created. False when it already
    /// existed, and always false for remove.
    pub structural: bool,
    /// Children whose snapshot table was created by this run.
    pub child_storage: Vec<TableName>,
    /// Children that took part, in declaration order.
    pub children: Vec<TableName>,
    /// Children left out because they could not be modelled.
    pub skipped_children: Vec<SchemaError>,
    pub outcome: GroupOutcome,
}

impl GroupReport {
    fn new(root: &TableName) -> Self {
        Self {
            root: root.clone(),
            structural: false,
            child_storage: Vec::new(),
            children: Vec::new(),
            skipped_children: Vec::new(),
            outcome: GroupOutcome::Done,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, GroupOutcome::Done)
    }
}

/// Per-group results of a batch, in input order.
#[derive(Debug, Default)]
pub struct Report {
    pub groups: Vec<GroupReport>,
}

impl Report {
    /// Whether any group was skipped or failed.
    pub fn has_failures(&self) -> bool {
        self.groups.iter().any(|g| !g.is_done())
    }
}

/// The script `install` would run, and what it would report.
#[derive(Debug)]
pub struct Plan {
    pub report: Report,
    pub statements: Vec<String>,
}

/// Drives introspection, synthesis and execution for batches of groups.
pub struct Orchestrator<E> {
    executor: E,
    options: Options,
    render: RenderContext,
}

impl<E: Executor + Send> Orchestrator<E> {
    pub fn new(executor: E, options: Options) -> Self {
        Self {
            executor,
            options,
            render: RenderContext::new(),
        }
    }

    /// Use the escaping rules of the target session (see
    /// [`Introspector::render_context`]).
    pub fn with_render_context(mut self, render: RenderContext) -> Self {
        self.render = render;
        self
    }

    pub fn executor(&mut self) -> &mut E {
        &mut self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Install (or upgrade) revisioning for every group.
    ///
    /// Storage is created only for groups that do not have it yet; triggers
    /// are always dropped and recreated so that new trigger logic reaches
    /// already revisioned tables.
    pub async fn install(&mut self, specs: &[GroupSpec]) -> Report {
        let mut report = Report::default();
        for spec in specs {
            let span = info_span!("install", group = %spec);
            let group = self.install_group(spec).instrument(span).await;
            report.groups.push(group);
        }
        report
    }

    /// Remove revisioning from every group. This drops all history.
    pub async fn remove(&mut self, specs: &[GroupSpec]) -> Report {
        let mut report = Report::default();
        for spec in specs {
            let span = info_span!("remove", group = %spec);
            let mut group = GroupReport::new(&spec.root);
            group.children = spec.children.clone();
            if let Err(err) = self.remove_group(spec).instrument(span).await {
                warn!(group = %spec, "remove failed: {err}");
                group.outcome = GroupOutcome::Failed(err);
            }
            report.groups.push(group);
        }
        report
    }

    /// Run `install` without changing anything: statements are collected
    /// instead of executed, while introspection still reads the live catalog.
    pub async fn plan(&mut self, specs: &[GroupSpec]) -> Plan {
        let mut dry = Orchestrator {
            executor: DryRun::new(&mut self.executor),
            options: self.options.clone(),
            render: self.render,
        };
        let report = dry.install(specs).await;
        Plan {
            report,
            statements: dry.executor.into_statements(),
        }
    }

    async fn install_group(&mut self, spec: &GroupSpec) -> GroupReport {
        let mut report = GroupReport::new(&spec.root);

        let built = {
            let mut introspector = Introspector::new(&mut self.executor);
            build_group(&mut introspector, spec).await
        };
        let built = match built {
            Ok(built) => built,
            Err(Error::Schema(err)) => {
                warn!(group = %spec, "skipping group: {err}");
                report.outcome = GroupOutcome::Skipped(err);
                return report;
            }
            Err(err) => {
                warn!(group = %spec, "install failed: {err}");
                report.outcome = GroupOutcome::Failed(err);
                return report;
            }
        };

        let group = built.group;
        report.structural = !group.structural_skip;
        report.children = group.children().iter().map(|c| c.table.name.clone()).collect();
        report.child_storage = group
            .children()
            .iter()
            .filter(|c| !c.storage_exists)
            .map(|c| c.table.name.clone())
            .collect();
        report.skipped_children = built.skipped_children;

        if let Err(err) = self.apply(&group).await {
            warn!(group = %spec, "install failed: {err}");
            report.outcome = GroupOutcome::Failed(err);
            return report;
        }

        info!(
            root = %group.root.name,
            children = report.children.len(),
            structural = report.structural,
            new_children = report.child_storage.len(),
            "revisioning installed"
        );
        report
    }

    async fn apply(&mut self, group: &TableGroup) -> Result<(), Error> {
        if group.structural_skip {
            info!(root = %group.root.name, "storage exists, reinstalling triggers only");
        } else {
            for stmt in ddl::root_statements(&group.root) {
                self.run(&stmt).await?;
            }
        }
        for child in group.children().iter().filter(|c| !c.storage_exists) {
            info!(child = %child.table.name, "creating child storage");
            for stmt in ddl::child_statements(child) {
                self.run(&stmt).await?;
            }
        }

        let triggers = TriggerSynthesizer::new(&self.options).group(group);
        for trigger in triggers {
            self.run(&DropTrigger::if_exists(trigger.name.clone())).await?;
            self.run(&Stmt::from(trigger)).await?;
        }
        Ok(())
    }

    async fn remove_group(&mut self, spec: &GroupSpec) -> Result<(), Error> {
        for table in spec.tables() {
            for kind in TriggerKind::ALL {
                self.run(&DropTrigger::if_exists(kind.name_for(table))).await?;
            }
        }

        self.run(&DropTable::if_exists(names::history_table(&spec.root)))
            .await?;
        for table in spec.tables() {
            self.run(&DropTable::if_exists(names::revision_table(table)))
                .await?;
        }

        let present = Introspector::new(&mut self.executor)
            .root_revision_columns(&spec.root)
            .await?;
        if !present.is_empty() {
            let strip = AlterTable::new(spec.root.clone())
                .ops(present.into_iter().map(AlterOp::DropColumn));
            self.run(&strip).await?;
        }

        info!(root = %spec.root, "revisioning removed");
        Ok(())
    }

    async fn run(&mut self, stmt: &impl Render) -> Result<u64, Error> {
        let sql = render_with(&self.render, stmt);
        Ok(self.executor.execute(&sql).await?)
    }
}
