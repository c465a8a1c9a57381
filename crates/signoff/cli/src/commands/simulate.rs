//! Scripted dry runs against an in-memory engine
//!
//! A script is a YAML (or JSON) list of operations. Case operations apply
//! to the most recently opened case. Failures are reported and the run
//! continues unless `--strict` is given.

use crate::error::{CliError, CliResult};
use crate::output::{print_error, print_info, print_success, render_value, OutputFormat};
use serde::{Deserialize, Serialize};
use signoff_engine::{ApprovalService, BindSignature, CompleteStep, EngineConfig, ReturnToStep};
use signoff_types::{Actor, CaseId, CaseState, FieldPath, TemplateId, UserId};
use std::path::{Path, PathBuf};

/// One scripted operation
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    Open {
        template: String,
        #[serde(default = "default_opener")]
        user: String,
    },
    Complete {
        step: u32,
        user: String,
        role: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
    Return {
        target: u32,
        user: String,
        role: String,
        #[serde(default)]
        reason: String,
    },
    RegisterSignature {
        user: String,
        /// Image path, relative to the script
        image: PathBuf,
    },
    DeleteSignature {
        user: String,
    },
    Bind {
        field: String,
        user: String,
        roles: Vec<String>,
    },
    Verify {
        field: String,
    },
}

fn default_opener() -> String {
    "operator".into()
}

impl ScriptOp {
    fn label(&self) -> String {
        match self {
            Self::Open { template, .. } => format!("open {}", template),
            Self::Complete { step, role, .. } => format!("complete step {} as {}", step, role),
            Self::Return { target, role, .. } => format!("return to step {} as {}", target, role),
            Self::RegisterSignature { user, .. } => format!("register signature of {}", user),
            Self::DeleteSignature { user } => format!("delete signature of {}", user),
            Self::Bind { field, user, .. } => format!("bind {} by {}", field, user),
            Self::Verify { field } => format!("verify {}", field),
        }
    }
}

/// Result of one operation
#[derive(Debug, Clone, Serialize)]
pub struct OpOutcome {
    pub index: usize,
    pub op: String,
    pub ok: bool,
    pub detail: String,
}

/// Result of a whole run
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub outcomes: Vec<OpOutcome>,
    pub case: Option<CaseState>,
    pub audit_chain_intact: bool,
}

impl SimulationReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.ok).count()
    }
}

pub fn load_script(path: &Path) -> CliResult<Vec<ScriptOp>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

/// Run `ops` against `service`, resolving image paths under `base_dir`.
pub fn run_script(
    service: &ApprovalService,
    ops: &[ScriptOp],
    base_dir: &Path,
    strict: bool,
) -> CliResult<SimulationReport> {
    let mut case: Option<CaseId> = None;
    let mut outcomes = Vec::with_capacity(ops.len());

    for (index, op) in ops.iter().enumerate() {
        let result = apply(service, op, base_dir, &mut case);
        let outcome = OpOutcome {
            index: index + 1,
            op: op.label(),
            ok: result.is_ok(),
            detail: match &result {
                Ok(detail) => detail.clone(),
                Err(e) => e.to_string(),
            },
        };
        tracing::debug!(index = outcome.index, op = %outcome.op, ok = outcome.ok, "Script step");
        outcomes.push(outcome);
        if strict {
            result?;
        }
    }

    let case = match &case {
        Some(id) => Some(service.get_state(id, &Actor::new("operator"))?.state),
        None => None,
    };
    Ok(SimulationReport {
        outcomes,
        case,
        audit_chain_intact: service.verify_audit_chain()?,
    })
}

fn apply(
    service: &ApprovalService,
    op: &ScriptOp,
    base_dir: &Path,
    case: &mut Option<CaseId>,
) -> CliResult<String> {
    match op {
        ScriptOp::Open { template, user } => {
            let state = service.open_case(&TemplateId::new(template.as_str()), &UserId::new(user.as_str()))?;
            let detail = format!("case {}", state.case_id);
            *case = Some(state.case_id);
            Ok(detail)
        }
        ScriptOp::Complete {
            step,
            user,
            role,
            payload,
        } => {
            let cmd = CompleteStep::new(current(case)?, *step, user.as_str(), role.as_str())
                .with_payload(payload.clone());
            let state = service.complete_step(cmd)?;
            Ok(format!("now at {}", state.position))
        }
        ScriptOp::Return {
            target,
            user,
            role,
            reason,
        } => {
            let cmd = ReturnToStep::new(
                current(case)?,
                *target,
                user.as_str(),
                role.as_str(),
                reason.as_str(),
            );
            let state = service.return_to_step(cmd)?;
            Ok(format!("now at {}", state.position))
        }
        ScriptOp::RegisterSignature { user, image } => {
            let bytes = std::fs::read(base_dir.join(image))?;
            let record = service.register_signature(&UserId::new(user.as_str()), &bytes)?;
            Ok(format!("{} ({} bytes)", record.format, record.size_bytes))
        }
        ScriptOp::DeleteSignature { user } => {
            service.delete_signature(&UserId::new(user.as_str()))?;
            Ok("deleted".into())
        }
        ScriptOp::Bind { field, user, roles } => {
            let signer = roles
                .iter()
                .fold(Actor::new(user.as_str()), |a, r| a.with_role(r.as_str()));
            let binding = service.bind_signature(BindSignature::new(
                current(case)?,
                FieldPath::parse(field)?,
                signer,
            ))?;
            Ok(format!("binding {}", binding.binding_id))
        }
        ScriptOp::Verify { field } => {
            let intact = service.verify_binding(&current(case)?, &FieldPath::parse(field)?)?;
            if intact {
                Ok("binding intact".into())
            } else {
                Err(CliError::InvalidInput(format!("binding on {} does not verify", field)))
            }
        }
    }
}

fn current(case: &Option<CaseId>) -> CliResult<CaseId> {
    case.clone()
        .ok_or_else(|| CliError::InvalidInput("no case has been opened".into()))
}

/// Run a script file against a fresh engine built from `config`.
pub fn execute(config: &Path, script: &Path, strict: bool, format: OutputFormat) -> CliResult<()> {
    let service = ApprovalService::new(&EngineConfig::from_path(config)?)?;
    let ops = load_script(script)?;
    let base_dir = script.parent().unwrap_or_else(|| Path::new("."));
    let report = run_script(&service, &ops, base_dir, strict)?;

    if format == OutputFormat::Table {
        for outcome in &report.outcomes {
            let line = format!("{:>3}. {}: {}", outcome.index, outcome.op, outcome.detail);
            if outcome.ok {
                print_success(&line);
            } else {
                print_error(&line);
            }
        }
        if let Some(case) = &report.case {
            print_info(&format!(
                "case {} at {} (version {})",
                case.case_id, case.position, case.version
            ));
        }
        print_info(&format!(
            "audit chain {}",
            if report.audit_chain_intact { "intact" } else { "BROKEN" }
        ));
    } else {
        println!("{}", render_value(&report, format));
    }

    match report.failures() {
        0 => Ok(()),
        n => Err(CliError::InvalidInput(format!("{} operation(s) failed", n))),
    }
}
