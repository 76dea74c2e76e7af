//! Category routing: which pipeline branch a resolved category continues into.

use crate::classify::TicketCategory;

/// Successor branch after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Generate a direct answer, then continue into dispatch.
    Answer,
    /// Build and (optionally) send the outbound ticket payload.
    Dispatch,
    /// Straight to the response formatter, skipping generation and dispatch.
    Exit,
}

/// Map a category to its branch. Total over the enum; every category matches
/// exactly one branch.
pub fn branch_for(category: TicketCategory) -> Branch {
    match category {
        TicketCategory::AiHistory => Branch::Answer,
        TicketCategory::O365 | TicketCategory::Hardware | TicketCategory::Login => Branch::Dispatch,
        TicketCategory::Other => Branch::Exit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_maps_to_exactly_one_branch() {
        for category in TicketCategory::ALL {
            // The match in branch_for is exhaustive; this pins the expected mapping.
            let branch = branch_for(category);
            match category {
                TicketCategory::AiHistory => assert_eq!(branch, Branch::Answer),
                TicketCategory::O365 | TicketCategory::Hardware | TicketCategory::Login => {
                    assert_eq!(branch, Branch::Dispatch)
                }
                TicketCategory::Other => assert_eq!(branch, Branch::Exit),
            }
        }
    }

    #[test]
    fn other_never_reaches_dispatch_or_answer() {
        assert_eq!(branch_for(TicketCategory::Other), Branch::Exit);
    }
}
