pub mod coords;
pub mod details;
pub mod locate;
pub mod page;

use coords::CoordinatePair;
use details::Details;
use locate::COORD_STRATEGIES;

/// What one pass over a page body found, plus which coordinate strategies
/// came up empty before the winner.
pub struct PageFindings {
    pub coordinates: Option<(&'static str, CoordinatePair)>,
    pub missed: Vec<&'static str>,
    pub details: Details,
}

/// Two-pass pipeline: body → page text → (coordinates, details).
/// Coordinate strategies stop at the first hit; details always run.
pub fn process_page(body: &str) -> PageFindings {
    let page = page::read_page(body);

    let mut missed = Vec::new();
    let mut coordinates = None;
    for strategy in COORD_STRATEGIES {
        match (strategy.run)(&page) {
            Some(pair) => {
                coordinates = Some((strategy.name, pair));
                break;
            }
            None => missed.push(strategy.name),
        }
    }

    PageFindings {
        coordinates,
        missed,
        details: details::extract(&page),
    }
}

// ── Tests ──
