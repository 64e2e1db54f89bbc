use crate::infra::{Records, Services};
use chrono::NaiveDate;
use clap::Args;
use kindred::activity::ScoringConfig;
use kindred::audit::UserId;
use kindred::config::ArchiveConfig;
use kindred::contributions::{ContributionSubmission, ProposedChange};
use kindred::error::AppError;
use kindred::import::{FamilyImporter, ImportSummary};
use kindred::records::{
    Gender, HouseholdId, HouseholdRole, LifeEvent, NewHousehold, NewParentChild, NewPartnership,
    NewPerson, ParentKind, PartnershipKind, PartnershipStatus, Person, PersonField,
    RecordServiceError,
};
use kindred::tree::MiniTree;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Generations shown above and below the focus in the mini tree
    #[arg(long)]
    pub(crate) generations: Option<u8>,
    /// Number of leaderboard entries to print
    #[arg(long, default_value_t = 5)]
    pub(crate) top: usize,
    /// Skip the contribution review portion of the demo
    #[arg(long)]
    pub(crate) skip_review: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Family CSV export to preview
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// List every skipped row and link
    #[arg(long)]
    pub(crate) list_skipped: bool,
}

struct DemoFamily {
    household: HouseholdId,
    olav: Person,
    astrid: Person,
    nils: Person,
    sigrid: Person,
}

fn owner() -> UserId {
    UserId::new("maren")
}

fn reviewer() -> UserId {
    UserId::new("jonas")
}

fn cousin() -> UserId {
    UserId::new("ines")
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        generations,
        top,
        skip_review,
    } = args;

    let services = Services::in_memory(ArchiveConfig::default(), ScoringConfig::default());
    println!("Kindred family archive demo");

    let family = match seed_family(&services.records) {
        Ok(family) => family,
        Err(err) => {
            println!("  Seeding failed: {}", err);
            return Ok(());
        }
    };
    println!(
        "- Seeded household {} around {}",
        family.household.0,
        family.sigrid.display_name()
    );

    if !skip_review {
        println!("\nContribution review");
        let submission = ContributionSubmission {
            person: family.astrid.id.clone(),
            change: ProposedChange::UpdateField {
                field: PersonField::BirthPlace,
                value: Some("Bergen".to_string()),
            },
            note: Some("baptism record, Bergen cathedral".to_string()),
        };
        match services.contributions.submit(&cousin(), submission) {
            Ok(contribution) => {
                println!(
                    "- {} proposed: {} (currently {})",
                    cousin(),
                    contribution.change.describe(),
                    contribution.current_value.as_deref().unwrap_or("unknown")
                );
                match services.contributions.approve(
                    &reviewer(),
                    &contribution.id,
                    Some("matches the parish register".to_string()),
                ) {
                    Ok(approved) => println!(
                        "  {} -> {} by {}",
                        approved.id,
                        approved.status.label(),
                        reviewer()
                    ),
                    Err(err) => println!("  Review failed: {}", err),
                }
            }
            Err(err) => println!("  Submission rejected: {}", err),
        }
    }

    println!("\nMini tree for {}", family.sigrid.display_name());
    match services
        .tree
        .mini_tree(&family.sigrid.id, generations, generations)
    {
        Ok(tree) => render_mini_tree(&tree),
        Err(err) => println!("  Tree unavailable: {}", err),
    }

    println!("\nKinship");
    for other in [&family.olav, &family.nils] {
        match services.tree.relationship(&family.sigrid.id, &other.id) {
            Ok(Some(relationship)) => println!(
                "- {} is {}'s {} ({} steps)",
                other.display_name(),
                family.sigrid.display_name(),
                relationship.label,
                relationship.degree
            ),
            Ok(None) => println!("- {} is not connected", other.display_name()),
            Err(err) => println!("- Lookup failed: {}", err),
        }
    }

    println!("\nLeaderboard");
    match services.activity.leaderboard(top) {
        Ok(entries) => {
            for entry in entries {
                println!(
                    "  {}. {} - {} points over {} actions",
                    entry.rank, entry.user, entry.points, entry.actions
                );
            }
        }
        Err(err) => println!("  Leaderboard unavailable: {}", err),
    }

    Ok(())
}

pub(crate) fn run_import_preview(args: ImportArgs) -> Result<(), AppError> {
    let summary = FamilyImporter::dry_run_path(&args.csv)?;
    render_import_summary(&summary, args.list_skipped);
    Ok(())
}

fn seed_family(records: &Records) -> Result<DemoFamily, RecordServiceError> {
    let household = records.create_household(
        &owner(),
        NewHousehold {
            name: "Lund family".to_string(),
            description: Some("Descendants of Olav and Ingrid Lund".to_string()),
        },
    )?;
    records.grant_household_role(&owner(), &household.id, &reviewer(), HouseholdRole::Editor)?;
    records.grant_household_role(&owner(), &household.id, &cousin(), HouseholdRole::Viewer)?;

    let person = |given: &str, gender: Gender, born: i32, place: &str, died: Option<i32>| {
        records.create_person(
            &owner(),
            NewPerson {
                given_name: given.to_string(),
                surname: "Lund".to_string(),
                gender,
                birth: LifeEvent {
                    date: NaiveDate::from_ymd_opt(born, 1, 1),
                    place: Some(place.to_string()),
                },
                death: LifeEvent {
                    date: died.and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
                    place: None,
                },
                household: Some(household.id.clone()),
                ..NewPerson::default()
            },
        )
    };

    let olav = person("Olav", Gender::Male, 1870, "Bergen", Some(1931))?;
    let ingrid = person("Ingrid", Gender::Female, 1874, "Voss", Some(1950))?;
    let astrid = person("Astrid", Gender::Female, 1901, "Bergn", Some(1988))?;
    let nils = person("Nils", Gender::Male, 1903, "Bergen", Some(1979))?;
    let erik = person("Erik", Gender::Male, 1899, "Stavanger", Some(1970))?;
    let sigrid = person("Sigrid", Gender::Female, 1925, "Oslo", None)?;

    for (parent, child) in [
        (&olav, &astrid),
        (&ingrid, &astrid),
        (&olav, &nils),
        (&ingrid, &nils),
        (&astrid, &sigrid),
        (&erik, &sigrid),
    ] {
        records.link_parent_child(
            &owner(),
            NewParentChild {
                parent: parent.id.clone(),
                child: child.id.clone(),
                kind: ParentKind::Biological,
            },
        )?;
    }
    for (first, second) in [(&olav, &ingrid), (&astrid, &erik)] {
        records.link_partnership(
            &owner(),
            NewPartnership {
                first: first.id.clone(),
                second: second.id.clone(),
                kind: PartnershipKind::Marriage,
                status: PartnershipStatus::Widowed,
                started_on: None,
                ended_on: None,
            },
        )?;
    }

    Ok(DemoFamily {
        household: household.id,
        olav,
        astrid,
        nils,
        sigrid,
    })
}

fn render_mini_tree(tree: &MiniTree) {
    for node in &tree.nodes {
        let years = match (node.person.birth_year, node.person.death_year) {
            (Some(born), Some(died)) => format!("{born}-{died}"),
            (Some(born), None) => format!("b. {born}"),
            (None, Some(died)) => format!("d. {died}"),
            (None, None) => "dates unknown".to_string(),
        };
        println!(
            "  [{:+}] {} ({}) {}",
            node.generation,
            node.person.name,
            years,
            node.role.label()
        );
    }
    println!("  {} edges", tree.edges.len());
}

fn render_import_summary(summary: &ImportSummary, list_skipped: bool) {
    println!("Import preview");
    println!("- {} rows read", summary.rows);
    println!("- {} people would be created", summary.people_created);
    println!(
        "- {} parent links | {} partnerships",
        summary.parent_links, summary.partnerships
    );
    println!("- {} entries skipped", summary.skipped.len());
    if list_skipped {
        for entry in &summary.skipped {
            println!("  - {}: {}", entry.reference, entry.reason);
        }
    }
}
