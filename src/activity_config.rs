use crate::error::{GradebookError, Result};
use crate::gradebook::{Capability, Gradebook, Synced};
use crate::model::{
    default_activity_configs, Bimester, ClassActivityConfig, SchoolClass, ACTIVITY_SLOTS,
};
use crate::store::ClassBucket;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSaveSummary {
    pub configs: Vec<ClassActivityConfig>,
    pub students_updated: usize,
}

/// Exactly one config per slot, positive max scores. Returns them sorted by slot.
fn validate(configs: &[ClassActivityConfig]) -> Result<Vec<ClassActivityConfig>> {
    if configs.len() != ACTIVITY_SLOTS.len() {
        return Err(GradebookError::validation(format!(
            "expected {} activity configs, got {}",
            ACTIVITY_SLOTS.len(),
            configs.len()
        )));
    }
    let mut sorted = configs.to_vec();
    sorted.sort_by_key(|c| c.id);
    for (c, slot) in sorted.iter().zip(ACTIVITY_SLOTS) {
        if c.id != slot {
            return Err(GradebookError::validation(format!(
                "activity config ids must be 1, 2 and 3 (found {})",
                c.id
            )));
        }
        if !c.max_score.is_finite() || c.max_score <= 0.0 {
            return Err(GradebookError::validation(format!(
                "maxScore must be positive for activity {}",
                c.id
            )));
        }
        if c.title.trim().is_empty() {
            return Err(GradebookError::validation(format!(
                "title required for activity {}",
                c.id
            )));
        }
    }
    Ok(sorted)
}

impl Gradebook {
    /// Stored template for the class/bimester, or the default one.
    pub fn activity_configs(
        &self,
        school_class: SchoolClass,
        bimester: Bimester,
    ) -> Result<Vec<ClassActivityConfig>> {
        Ok(self
            .store()
            .class_doc(ClassBucket::ActivityConfigs, school_class, bimester)?
            .unwrap_or_else(default_activity_configs))
    }

    /// Persists the template and rewrites the matching activity metadata of
    /// every student in the class. Scores are left alone.
    pub fn save_activity_configs(
        &self,
        school_class: SchoolClass,
        bimester: Bimester,
        configs: &[ClassActivityConfig],
    ) -> Result<Synced<ConfigSaveSummary>> {
        self.require(Capability::Admin)?;
        let configs = validate(configs)?;

        self.store().put_class_doc(
            ClassBucket::ActivityConfigs,
            school_class,
            bimester,
            &configs,
        )?;

        let mut students = self.store().students_in_class(school_class)?;
        for s in students.iter_mut() {
            for conf in &configs {
                if let Some(a) = s.activity_mut(bimester, conf.id) {
                    a.apply_config(conf);
                }
            }
        }
        self.store().put_students(&students)?;
        for s in &students {
            self.refresh_session_for(s)?;
        }
        info!(
            class = school_class.code(),
            bimester = bimester.label(),
            students = students.len(),
            "activity template saved"
        );

        let push = self
            .push_configs(school_class, bimester, &configs)
            .and(self.push_students(&students));
        Ok(Synced::new(
            ConfigSaveSummary {
                configs,
                students_updated: students.len(),
            },
            push,
        ))
    }
}
