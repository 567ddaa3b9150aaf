//! Build success policy and the list of tests found in a build.

use std::sync::Arc;

use quill_core::{Definition, Module};
use quill_syntax::{Diagnostics, DefinitionLocation, Modifier, ModuleLocation};

use crate::build::{Build, Elaborated};
use crate::error::{BuildError, Stage};
use crate::read::project_modules;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Error diagnostics on a module (`None`) or on a definition.
    Errors {
        module: ModuleLocation,
        definition: Option<DefinitionLocation>,
        count: usize,
    },
    /// An `:error` definition that elaborated without an error.
    UnexpectedSuccess(DefinitionLocation),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    pub failures: Vec<Failure>,
    /// Definitions marked `:test`, in module order.
    pub tests: Vec<DefinitionLocation>,
}

impl Report {
    pub fn new<'a>(modules: impl IntoIterator<Item = &'a Elaborated>) -> Self {
        let mut report = Report::default();
        for elaborated in modules {
            report.add(&elaborated.module, &elaborated.diagnostics);
        }
        report
    }

    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    fn add(&mut self, module: &Module, diagnostics: &Diagnostics) {
        let expects_error = |location: &DefinitionLocation| {
            matches!(
                module.definitions.get(location),
                Some(Definition::Def(def)) if def.has_modifier(Modifier::Error)
            )
        };

        for (key, list) in diagnostics {
            if key.as_ref().is_some_and(|location| expects_error(location)) {
                continue;
            }
            let count = list.iter().filter(|d| d.is_error()).count();
            if count > 0 {
                self.failures.push(Failure::Errors {
                    module: module.name.clone(),
                    definition: key.clone(),
                    count,
                });
            }
        }

        for (location, definition) in &module.definitions {
            let Definition::Def(def) = definition else {
                continue;
            };
            if def.has_modifier(Modifier::Error) {
                let failed = diagnostics
                    .get(&Some(location.clone()))
                    .is_some_and(|list| list.iter().any(|d| d.is_error()));
                if !failed {
                    self.failures.push(Failure::UnexpectedSuccess(location.clone()));
                }
            }
            if def.has_modifier(Modifier::Test) {
                self.tests.push(location.clone());
            }
        }
    }
}

impl Build {
    /// Elaborate every module of the project and apply the success policy.
    #[tracing::instrument(skip_all)]
    pub async fn check_project(self: &Arc<Self>) -> Result<Report, BuildError> {
        let modules = project_modules(self.config()).await;
        let handles: Vec<_> = modules
            .iter()
            .map(|module| (module.clone(), tokio::spawn(self.fetch_elaborated(module.clone(), None))))
            .collect();

        let mut elaborated = Vec::new();
        for (module, handle) in handles {
            let trace = handle
                .await
                .map_err(|err| BuildError::from_join(err, module, Stage::Elaborated))??;
            elaborated.push(trace.value);
        }

        let report = Report::new(elaborated.iter().map(|module| module.as_ref()));
        tracing::info!(
            modules = modules.len(),
            failures = report.failures.len(),
            tests = report.tests.len(),
            "checked project"
        );
        Ok(report)
    }
}
