//! SQL preview command

use anyhow::{bail, Result};

use crate::config::Settings;
use crate::etl::{copy_specs, copy_statements, insert_statements, WeekdayRule};
use crate::statement::{Phase, Statement};
use crate::warehouse::{schema, Dialect};

/// Print what each phase would run, without connecting.
///
/// `settings` is only needed for the copy phase, which embeds the data
/// locations and credential reference.
pub fn run(phases: &[Phase], dialect: Dialect, settings: Option<&Settings>) -> Result<()> {
    let weekday = settings.map(|s| s.weekday).unwrap_or_default();

    for phase in phases {
        for statement in statements(*phase, dialect, settings, weekday)? {
            println!("-- {} {}\n{}\n", statement.phase, statement.label, statement.sql);
        }
    }
    Ok(())
}

fn statements(
    phase: Phase,
    dialect: Dialect,
    settings: Option<&Settings>,
    weekday: WeekdayRule,
) -> Result<Vec<Statement>> {
    let statements = match phase {
        Phase::Drop => schema::drop_statements(),
        Phase::Create => schema::create_statements(dialect),
        Phase::Insert => insert_statements(dialect, weekday),
        Phase::Copy if dialect == Dialect::Sqlite => {
            println!("-- copy: the local load depends on the source files and is built at run time\n");
            Vec::new()
        }
        Phase::Copy => {
            let Some(settings) = settings else {
                bail!("the copy phase needs a valid settings file");
            };
            let Some(iam_role) = settings.iam_role() else {
                bail!("the copy phase needs IAM_ROLE.ARN (redshift engine)");
            };
            copy_statements(&copy_specs(&settings.sources), iam_role, &settings.region)
        }
    };
    Ok(statements)
}
