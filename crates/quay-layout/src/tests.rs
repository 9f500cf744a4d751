#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use quay_core::{PaneId, SplitId, TabId};

    use crate::{
        plan_drop, resolve, validate, ActionStateSnapshot, AppCommand, DropDecision,
        InsertDirection, PaneAction, PaneDropDestination, PaneSource, Rect, SplitDirection,
        SplitDropPayload, SplitTree, TabSnapshot, MAX_RATIO, MIN_RATIO,
    };

    fn split(direction: SplitDirection, ratio: f64, left: SplitTree, right: SplitTree) -> SplitTree {
        SplitTree::Split {
            id: SplitId::new(),
            direction,
            ratio,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Structural equality that ignores split ids (they are freshly
    /// generated on every structural operation).
    fn same_shape(a: &SplitTree, b: &SplitTree) -> bool {
        match (a, b) {
            (SplitTree::Leaf(pane_a), SplitTree::Leaf(pane_b)) => pane_a == pane_b,
            (
                SplitTree::Split {
                    direction: dir_a,
                    ratio: ratio_a,
                    left: left_a,
                    right: right_a,
                    ..
                },
                SplitTree::Split {
                    direction: dir_b,
                    ratio: ratio_b,
                    left: left_b,
                    right: right_b,
                    ..
                },
            ) => {
                dir_a == dir_b
                    && (ratio_a - ratio_b).abs() < 1e-9
                    && same_shape(left_a, left_b)
                    && same_shape(right_a, right_b)
            }
            _ => false,
        }
    }

    // ──────────────────────────────────────────
    // Tree structure
    // ──────────────────────────────────────────

    #[test]
    fn test_insert_then_remove_restores_shape() {
        let pane_a = PaneId::new();
        let pane_b = PaneId::new();
        let pane_c = PaneId::new();
        let original = split(
            SplitDirection::Horizontal,
            0.5,
            SplitTree::leaf(pane_a),
            SplitTree::leaf(pane_b),
        );

        let mut tree = original.clone();
        assert!(tree.insert_pane_at(pane_b, pane_c, SplitDirection::Horizontal, false));
        assert_eq!(tree.pane_ids(), vec![pane_a, pane_b, pane_c]);

        match tree.remove_pane(pane_c) {
            Some(Some(replacement)) => tree = replacement,
            other => panic!("unexpected removal result: {other:?}"),
        }
        assert!(same_shape(&tree, &original), "remove should undo insert");
    }

    #[test]
    fn test_remove_then_insert_is_idempotent_up_to_split_ids() {
        let pane_a = PaneId::new();
        let pane_b = PaneId::new();
        let original = split(
            SplitDirection::Horizontal,
            0.5,
            SplitTree::leaf(pane_a),
            SplitTree::leaf(pane_b),
        );

        let mut tree = original.clone();
        match tree.remove_pane(pane_b) {
            Some(Some(replacement)) => tree = replacement,
            other => panic!("unexpected removal result: {other:?}"),
        }
        assert!(tree.insert_pane_at(pane_a, pane_b, SplitDirection::Horizontal, false));
        assert!(same_shape(&tree, &original));
    }

    #[test]
    fn test_chain_insert_equalizes_ratios() {
        let pane_a = PaneId::new();
        let pane_b = PaneId::new();
        let pane_c = PaneId::new();
        let mut tree = split(
            SplitDirection::Horizontal,
            0.5,
            SplitTree::leaf(pane_a),
            SplitTree::leaf(pane_b),
        );
        assert!(tree.insert_pane_at(pane_b, pane_c, SplitDirection::Horizontal, false));

        // Three equal columns: outer ratio 1/3, inner 1/2.
        let rects: BTreeMap<PaneId, Rect> = tree.compute_rects(Rect::UNIT).into_iter().collect();
        for pane in [pane_a, pane_b, pane_c] {
            let rect = rects[&pane];
            assert!(
                (rect.width - 1.0 / 3.0).abs() < 1e-9,
                "pane should occupy a third, got {}",
                rect.width
            );
        }
    }

    #[test]
    fn test_set_ratio_clamps_on_write() {
        let pane_a = PaneId::new();
        let pane_b = PaneId::new();
        let split_id = SplitId::new();
        let mut tree = SplitTree::Split {
            id: split_id,
            direction: SplitDirection::Horizontal,
            ratio: 0.5,
            left: Box::new(SplitTree::leaf(pane_a)),
            right: Box::new(SplitTree::leaf(pane_b)),
        };

        assert!(tree.set_ratio(split_id, 0.99));
        match &tree {
            SplitTree::Split { ratio, .. } => assert_eq!(*ratio, MAX_RATIO),
            _ => unreachable!(),
        }
        assert!(tree.set_ratio(split_id, 0.0));
        match &tree {
            SplitTree::Split { ratio, .. } => assert_eq!(*ratio, MIN_RATIO),
            _ => unreachable!(),
        }
        assert!(!tree.set_ratio(SplitId::new(), 0.5));
    }

    // ──────────────────────────────────────────
    // Snapshot builders
    // ──────────────────────────────────────────

    struct Workbench {
        snapshot: ActionStateSnapshot,
        tab1: TabId,
        pane_a: PaneId,
        pane_b: PaneId,
        drawer_pane: PaneId,
    }

    /// Two tabs: T1 = [A | B] with a drawer under A, T2 = single pane X.
    fn workbench() -> Workbench {
        let pane_a = PaneId::new();
        let pane_b = PaneId::new();
        let pane_x = PaneId::new();
        let drawer_pane = PaneId::new();
        let tab1 = TabId::new();
        let tab2 = TabId::new();

        let mut tab1_snapshot = TabSnapshot::with_tree(
            tab1,
            split(
                SplitDirection::Horizontal,
                0.5,
                SplitTree::leaf(pane_a),
                SplitTree::leaf(pane_b),
            ),
        );
        tab1_snapshot.active_pane_id = pane_a;
        tab1_snapshot
            .drawer_trees
            .insert(pane_a, SplitTree::leaf(drawer_pane));

        let tab2_snapshot = TabSnapshot::with_tree(tab2, SplitTree::leaf(pane_x));

        let mut drawer_parent_by_pane_id = BTreeMap::new();
        drawer_parent_by_pane_id.insert(drawer_pane, pane_a);

        Workbench {
            snapshot: ActionStateSnapshot {
                tabs: vec![tab1_snapshot, tab2_snapshot],
                active_tab_id: Some(tab1),
                is_management_mode_active: true,
                known_worktree_ids: Default::default(),
                drawer_parent_by_pane_id,
            },
            tab1,
            pane_a,
            pane_b,
            drawer_pane,
        }
    }

    // ──────────────────────────────────────────
    // Command resolution
    // ──────────────────────────────────────────

    #[test]
    fn test_every_resolved_command_passes_validation() {
        let commands = [
            AppCommand::CloseTab,
            AppCommand::ClosePane,
            AppCommand::SplitRight,
            AppCommand::SplitBelow,
            AppCommand::FocusPaneLeft,
            AppCommand::FocusPaneRight,
            AppCommand::FocusPaneUp,
            AppCommand::FocusPaneDown,
            AppCommand::NextTab,
            AppCommand::PrevTab,
            AppCommand::SelectTab(0),
            AppCommand::SelectTab(1),
            AppCommand::SelectTab(2),
            AppCommand::SelectTab(9),
            AppCommand::EqualizePanes,
            AppCommand::BreakUpTab,
            AppCommand::ExtractPaneToTab,
            AppCommand::MinimizePane,
            AppCommand::ExpandPane,
            AppCommand::AddDrawerPane,
            AppCommand::ToggleDrawer,
        ];

        let empty = ActionStateSnapshot::default();
        let bench = workbench();
        for snapshot in [&empty, &bench.snapshot] {
            for command in commands {
                if let Some(action) = resolve(snapshot, command) {
                    validate(snapshot, &action).unwrap_or_else(|err| {
                        panic!("resolve({command:?}) produced invalid {action:?}: {err}")
                    });
                }
            }
        }
    }

    #[test]
    fn test_commands_without_active_tab_resolve_to_none() {
        let snapshot = ActionStateSnapshot::default();
        assert_eq!(resolve(&snapshot, AppCommand::SplitRight), None);
        assert_eq!(resolve(&snapshot, AppCommand::CloseTab), None);
        assert_eq!(resolve(&snapshot, AppCommand::NextTab), None);
    }

    #[test]
    fn test_split_below_is_reserved_for_drawers() {
        let bench = workbench();
        assert_eq!(resolve(&bench.snapshot, AppCommand::SplitBelow), None);
    }

    #[test]
    fn test_split_right_targets_active_pane() {
        let bench = workbench();
        let action = resolve(&bench.snapshot, AppCommand::SplitRight).unwrap();
        assert_eq!(
            action,
            PaneAction::InsertPane {
                source: PaneSource::NewTerminal,
                target_tab_id: bench.tab1,
                target_pane_id: bench.pane_a,
                direction: InsertDirection::Right,
            }
        );
    }

    #[test]
    fn test_focus_right_finds_horizontal_neighbor() {
        let bench = workbench();
        let action = resolve(&bench.snapshot, AppCommand::FocusPaneRight).unwrap();
        assert_eq!(
            action,
            PaneAction::FocusPane {
                tab_id: bench.tab1,
                pane_id: bench.pane_b,
            }
        );
        // No pane to the left of A.
        assert_eq!(resolve(&bench.snapshot, AppCommand::FocusPaneLeft), None);
    }

    #[test]
    fn test_focus_navigation_in_grid() {
        // [ A | B ]
        // [ C | D ]
        let pane_a = PaneId::new();
        let pane_b = PaneId::new();
        let pane_c = PaneId::new();
        let pane_d = PaneId::new();
        let tab_id = TabId::new();
        let tree = split(
            SplitDirection::Vertical,
            0.5,
            split(
                SplitDirection::Horizontal,
                0.5,
                SplitTree::leaf(pane_a),
                SplitTree::leaf(pane_b),
            ),
            split(
                SplitDirection::Horizontal,
                0.5,
                SplitTree::leaf(pane_c),
                SplitTree::leaf(pane_d),
            ),
        );
        let mut tab = TabSnapshot::with_tree(tab_id, tree);
        tab.active_pane_id = pane_a;
        let snapshot = ActionStateSnapshot {
            tabs: vec![tab],
            active_tab_id: Some(tab_id),
            ..ActionStateSnapshot::default()
        };

        let down = resolve(&snapshot, AppCommand::FocusPaneDown).unwrap();
        assert_eq!(
            down,
            PaneAction::FocusPane {
                tab_id,
                pane_id: pane_c
            }
        );
        let right = resolve(&snapshot, AppCommand::FocusPaneRight).unwrap();
        assert_eq!(
            right,
            PaneAction::FocusPane {
                tab_id,
                pane_id: pane_b
            }
        );
        assert_eq!(resolve(&snapshot, AppCommand::FocusPaneUp), None);
    }

    #[test]
    fn test_tab_cycling_wraps() {
        let bench = workbench();
        let next = resolve(&bench.snapshot, AppCommand::NextTab).unwrap();
        assert_eq!(
            next,
            PaneAction::SelectTab {
                tab_id: bench.snapshot.tabs[1].id
            }
        );
        // Previous from the first tab wraps to the last.
        let prev = resolve(&bench.snapshot, AppCommand::PrevTab).unwrap();
        assert_eq!(
            prev,
            PaneAction::SelectTab {
                tab_id: bench.snapshot.tabs[1].id
            }
        );
    }

    #[test]
    fn test_select_tab_is_one_based_and_bounded() {
        let bench = workbench();
        assert_eq!(resolve(&bench.snapshot, AppCommand::SelectTab(0)), None);
        assert_eq!(
            resolve(&bench.snapshot, AppCommand::SelectTab(1)),
            Some(PaneAction::SelectTab { tab_id: bench.tab1 })
        );
        assert_eq!(resolve(&bench.snapshot, AppCommand::SelectTab(3)), None);
        assert_eq!(resolve(&bench.snapshot, AppCommand::SelectTab(9)), None);
    }

    #[test]
    fn test_close_pane_on_single_pane_tab_closes_tab() {
        let pane = PaneId::new();
        let tab_id = TabId::new();
        let snapshot = ActionStateSnapshot {
            tabs: vec![TabSnapshot::with_tree(tab_id, SplitTree::leaf(pane))],
            active_tab_id: Some(tab_id),
            ..ActionStateSnapshot::default()
        };
        assert_eq!(
            resolve(&snapshot, AppCommand::ClosePane),
            Some(PaneAction::CloseTab { tab_id })
        );
    }

    #[test]
    fn test_extract_needs_multi_pane_tab() {
        let pane = PaneId::new();
        let tab_id = TabId::new();
        let snapshot = ActionStateSnapshot {
            tabs: vec![TabSnapshot::with_tree(tab_id, SplitTree::leaf(pane))],
            active_tab_id: Some(tab_id),
            ..ActionStateSnapshot::default()
        };
        assert_eq!(resolve(&snapshot, AppCommand::ExtractPaneToTab), None);
        assert_eq!(resolve(&snapshot, AppCommand::BreakUpTab), None);
    }

    #[test]
    fn test_plan_repairs_heals_stale_references() {
        use crate::{plan_repairs, RepairAction};

        let mut bench = workbench();
        // Point the active pane and zoom at panes that are no longer in the
        // tree, the shape a crash mid-mutation can leave behind.
        bench.snapshot.tabs[0].active_pane_id = PaneId::new();
        bench.snapshot.tabs[0].zoomed_pane_id = Some(PaneId::new());

        let repairs = plan_repairs(&bench.snapshot);
        assert_eq!(repairs.len(), 2);
        assert!(repairs.iter().any(|action| matches!(
            action,
            PaneAction::Repair(RepairAction::ResetActivePane { tab_id, pane_id })
                if *tab_id == bench.tab1 && *pane_id == bench.pane_a
        )));
        assert!(repairs.iter().any(|action| matches!(
            action,
            PaneAction::Repair(RepairAction::ClearZoom { tab_id }) if *tab_id == bench.tab1
        )));
        for repair in &repairs {
            assert!(validate(&bench.snapshot, repair).is_ok());
        }

        // A healthy snapshot needs no repairs.
        assert!(plan_repairs(&workbench().snapshot).is_empty());
    }

    // ──────────────────────────────────────────
    // Drop planning
    // ──────────────────────────────────────────

    #[test]
    fn test_drop_outside_management_mode_is_ineligible() {
        let mut bench = workbench();
        bench.snapshot.is_management_mode_active = false;
        let decision = plan_drop(
            &bench.snapshot,
            SplitDropPayload::NewTerminal,
            PaneDropDestination::Split {
                target_tab_id: bench.tab1,
                target_pane_id: bench.pane_a,
                direction: InsertDirection::Right,
                target_drawer_parent_pane_id: None,
            },
        );
        assert_eq!(decision, DropDecision::Ineligible);
    }

    #[test]
    fn test_drawer_pane_on_tab_bar_is_ineligible() {
        let bench = workbench();
        let decision = plan_drop(
            &bench.snapshot,
            SplitDropPayload::ExistingPane {
                pane_id: bench.drawer_pane,
                source_tab_id: bench.tab1,
            },
            PaneDropDestination::TabBarInsertion { target_tab_index: 0 },
        );
        assert_eq!(decision, DropDecision::Ineligible);
    }

    #[test]
    fn test_multi_pane_tab_bar_drop_is_atomic_extract_then_move() {
        let bench = workbench();
        let decision = plan_drop(
            &bench.snapshot,
            SplitDropPayload::ExistingPane {
                pane_id: bench.pane_a,
                source_tab_id: bench.tab1,
            },
            PaneDropDestination::TabBarInsertion { target_tab_index: 1 },
        );
        assert_eq!(
            decision,
            DropDecision::Resolved(PaneAction::ExtractPaneToTabThenMove {
                pane_id: bench.pane_a,
                source_tab_id: bench.tab1,
                to_index: 1,
            })
        );
    }

    #[test]
    fn test_single_pane_tab_bar_drop_is_plain_move() {
        let bench = workbench();
        let tab2 = bench.snapshot.tabs[1].id;
        let pane_x = bench.snapshot.tabs[1].active_pane_id;
        let decision = plan_drop(
            &bench.snapshot,
            SplitDropPayload::ExistingPane {
                pane_id: pane_x,
                source_tab_id: tab2,
            },
            PaneDropDestination::TabBarInsertion { target_tab_index: 0 },
        );
        assert_eq!(
            decision,
            DropDecision::Resolved(PaneAction::MoveTab {
                tab_id: tab2,
                to_index: 0,
            })
        );
    }

    #[test]
    fn test_self_insert_is_ineligible() {
        let bench = workbench();
        let decision = plan_drop(
            &bench.snapshot,
            SplitDropPayload::ExistingPane {
                pane_id: bench.pane_a,
                source_tab_id: bench.tab1,
            },
            PaneDropDestination::Split {
                target_tab_id: bench.tab1,
                target_pane_id: bench.pane_a,
                direction: InsertDirection::Left,
                target_drawer_parent_pane_id: None,
            },
        );
        assert_eq!(decision, DropDecision::Ineligible);
    }

    #[test]
    fn test_multi_pane_tab_split_drop_merges() {
        let bench = workbench();
        let tab2 = bench.snapshot.tabs[1].id;
        let pane_x = bench.snapshot.tabs[1].active_pane_id;
        let decision = plan_drop(
            &bench.snapshot,
            SplitDropPayload::ExistingTab { tab_id: bench.tab1 },
            PaneDropDestination::Split {
                target_tab_id: tab2,
                target_pane_id: pane_x,
                direction: InsertDirection::Right,
                target_drawer_parent_pane_id: None,
            },
        );
        assert_eq!(
            decision,
            DropDecision::Resolved(PaneAction::MergeTab {
                source_tab_id: bench.tab1,
                target_tab_id: tab2,
                target_pane_id: pane_x,
                direction: InsertDirection::Right,
            })
        );
    }

    #[test]
    fn test_single_pane_tab_split_drop_inserts_pane() {
        let bench = workbench();
        let tab2 = bench.snapshot.tabs[1].id;
        let pane_x = bench.snapshot.tabs[1].active_pane_id;
        let decision = plan_drop(
            &bench.snapshot,
            SplitDropPayload::ExistingTab { tab_id: tab2 },
            PaneDropDestination::Split {
                target_tab_id: bench.tab1,
                target_pane_id: bench.pane_b,
                direction: InsertDirection::Left,
                target_drawer_parent_pane_id: None,
            },
        );
        assert_eq!(
            decision,
            DropDecision::Resolved(PaneAction::InsertPane {
                source: PaneSource::ExistingPane {
                    pane_id: pane_x,
                    source_tab_id: tab2,
                },
                target_tab_id: bench.tab1,
                target_pane_id: bench.pane_b,
                direction: InsertDirection::Left,
            })
        );
    }

    #[test]
    fn test_tab_self_merge_is_ineligible() {
        let bench = workbench();
        let decision = plan_drop(
            &bench.snapshot,
            SplitDropPayload::ExistingTab { tab_id: bench.tab1 },
            PaneDropDestination::Split {
                target_tab_id: bench.tab1,
                target_pane_id: bench.pane_b,
                direction: InsertDirection::Right,
                target_drawer_parent_pane_id: None,
            },
        );
        assert_eq!(decision, DropDecision::Ineligible);
    }

    #[test]
    fn test_cross_drawer_moves_are_ineligible() {
        let mut bench = workbench();
        // Give B its own drawer with one pane.
        let other_drawer_pane = PaneId::new();
        bench.snapshot.tabs[0]
            .drawer_trees
            .insert(bench.pane_b, SplitTree::leaf(other_drawer_pane));
        bench
            .snapshot
            .drawer_parent_by_pane_id
            .insert(other_drawer_pane, bench.pane_b);

        // A's drawer pane dropped into B's drawer.
        let decision = plan_drop(
            &bench.snapshot,
            SplitDropPayload::ExistingPane {
                pane_id: bench.drawer_pane,
                source_tab_id: bench.tab1,
            },
            PaneDropDestination::Split {
                target_tab_id: bench.tab1,
                target_pane_id: other_drawer_pane,
                direction: InsertDirection::Right,
                target_drawer_parent_pane_id: Some(bench.pane_b),
            },
        );
        assert_eq!(decision, DropDecision::Ineligible);
    }

    #[test]
    fn test_same_drawer_move_resolves() {
        let mut bench = workbench();
        let second_drawer_pane = PaneId::new();
        let tree = bench.snapshot.tabs[0]
            .drawer_trees
            .get_mut(&bench.pane_a)
            .unwrap();
        assert!(tree.insert_pane_at(
            bench.drawer_pane,
            second_drawer_pane,
            SplitDirection::Horizontal,
            false
        ));
        bench
            .snapshot
            .drawer_parent_by_pane_id
            .insert(second_drawer_pane, bench.pane_a);

        let decision = plan_drop(
            &bench.snapshot,
            SplitDropPayload::ExistingPane {
                pane_id: bench.drawer_pane,
                source_tab_id: bench.tab1,
            },
            PaneDropDestination::Split {
                target_tab_id: bench.tab1,
                target_pane_id: second_drawer_pane,
                direction: InsertDirection::Right,
                target_drawer_parent_pane_id: Some(bench.pane_a),
            },
        );
        let expected = PaneAction::MoveDrawerPane {
            parent_pane_id: bench.pane_a,
            drawer_pane_id: bench.drawer_pane,
            target_drawer_pane_id: second_drawer_pane,
            direction: InsertDirection::Right,
        };
        assert_eq!(decision, DropDecision::Resolved(expected.clone()));
        assert!(validate(&bench.snapshot, &expected).is_ok());
    }

    #[test]
    fn test_resolved_drops_pass_validation() {
        let bench = workbench();
        let tab2 = bench.snapshot.tabs[1].id;
        let pane_x = bench.snapshot.tabs[1].active_pane_id;
        let payloads = [
            SplitDropPayload::NewTerminal,
            SplitDropPayload::ExistingTab { tab_id: bench.tab1 },
            SplitDropPayload::ExistingTab { tab_id: tab2 },
            SplitDropPayload::ExistingPane {
                pane_id: bench.pane_a,
                source_tab_id: bench.tab1,
            },
            SplitDropPayload::ExistingPane {
                pane_id: bench.drawer_pane,
                source_tab_id: bench.tab1,
            },
        ];
        let destinations = [
            PaneDropDestination::Split {
                target_tab_id: bench.tab1,
                target_pane_id: bench.pane_b,
                direction: InsertDirection::Left,
                target_drawer_parent_pane_id: None,
            },
            PaneDropDestination::Split {
                target_tab_id: tab2,
                target_pane_id: pane_x,
                direction: InsertDirection::Right,
                target_drawer_parent_pane_id: None,
            },
            PaneDropDestination::TabBarInsertion { target_tab_index: 0 },
            PaneDropDestination::TabBarInsertion { target_tab_index: 1 },
        ];
        for payload in payloads {
            for destination in destinations {
                if let DropDecision::Resolved(action) =
                    plan_drop(&bench.snapshot, payload, destination)
                {
                    validate(&bench.snapshot, &action).unwrap_or_else(|err| {
                        panic!("drop ({payload:?} → {destination:?}) produced invalid {action:?}: {err}")
                    });
                }
            }
        }
    }
}
