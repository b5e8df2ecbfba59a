#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Once;

    use float_cmp::approx_eq;
    use test_case::test_case;

    use geo::Coord;
    use mrp::io;
    use polypack::io::{parse_instance, write_bin_files};
    use polypack::nfp::NfpEngine;
    use polypack::{
        pack, pack_preserve_order, Bin, CancelSwitch, PackConfig, PackError, PackSolution, Piece,
        Rect, EPS,
    };

    static INIT_LOGGER: Once = Once::new();

    fn init() {
        INIT_LOGGER.call_once(|| {
            let _ = io::init_logger(log::LevelFilter::Warn);
        });
    }

    fn rect(w: f64, h: f64) -> Rect {
        Rect::try_new(0.0, 0.0, w, h).unwrap()
    }

    fn square(id: u64, size: f64) -> Piece {
        Piece::rectangle(id, size, size).unwrap()
    }

    fn l_piece(id: u64) -> Piece {
        // 60x60 outline minus its top-right 30x30 quadrant: area 2700
        Piece::new(
            vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 60.0, y: 0.0 },
                Coord { x: 60.0, y: 30.0 },
                Coord { x: 30.0, y: 30.0 },
                Coord { x: 30.0, y: 60.0 },
                Coord { x: 0.0, y: 60.0 },
            ],
            id,
        )
        .unwrap()
    }

    /// The universal invariants: containment, pairwise non-overlap, and
    /// free-rectangle maximality, on every produced bin.
    fn assert_solution_invariants(solution: &PackSolution) {
        for bin in &solution.bins {
            let dimension = bin.dimension();
            let pieces = bin.placed_pieces();
            for piece in pieces {
                assert!(
                    piece.is_inside(&dimension),
                    "piece {} escapes the bin",
                    piece.id()
                );
            }
            for i in 0..pieces.len() {
                for j in i + 1..pieces.len() {
                    assert!(
                        !pieces[i].overlaps(&pieces[j], EPS),
                        "pieces {} and {} overlap",
                        pieces[i].id(),
                        pieces[j].id()
                    );
                }
            }
            for (i, a) in bin.free_rects().iter().enumerate() {
                assert!(dimension.contains(a), "free rect {a:?} escapes the bin");
                for (j, b) in bin.free_rects().iter().enumerate() {
                    assert!(
                        i == j || !(b.contains(a) && b != a),
                        "free rect {a:?} is contained in {b:?}"
                    );
                }
            }
        }
    }

    // S1: two 30x30 squares cannot share a 50x50 bin.
    #[test]
    fn two_squares_split_over_two_bins() {
        init();
        let solution = pack(
            vec![square(1, 30.0), square(2, 30.0)],
            rect(50.0, 50.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();

        assert_solution_invariants(&solution);
        assert!(solution.is_complete());
        assert_eq!(solution.n_bins(), 2);

        let first = &solution.bins[0];
        assert_eq!(first.placed_pieces()[0].id(), 1);
        let corner = first.placed_pieces()[0].bbox();
        assert!(approx_eq!(f64, corner.x_min, 0.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, corner.y_min, 0.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, first.occupied_area(), 900.0, epsilon = 1e-6));

        let second = &solution.bins[1];
        let corner = second.placed_pieces()[0].bbox();
        assert!(approx_eq!(f64, corner.x_min, 0.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, corner.y_min, 0.0, epsilon = 1e-9));
    }

    // S2: four 50x50 squares tile a 100x100 bin exactly.
    #[test]
    fn four_squares_tile_the_bin() {
        init();
        let pieces = (1..=4).map(|id| square(id, 50.0)).collect();
        let solution = pack(
            pieces,
            rect(100.0, 100.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();

        assert_solution_invariants(&solution);
        assert_eq!(solution.n_bins(), 1);
        let bin = &solution.bins[0];
        assert_eq!(bin.n_placed(), 4);
        assert!(approx_eq!(f64, bin.occupied_area(), 10_000.0, epsilon = 1e-6));
        assert!(approx_eq!(f64, bin.empty_area(), 0.0, epsilon = 1e-6));

        let mut corners: Vec<(f64, f64)> = bin
            .placed_pieces()
            .iter()
            .map(|p| (p.bbox().x_min, p.bbox().y_min))
            .collect();
        corners.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(
            corners,
            vec![(0.0, 0.0), (0.0, 50.0), (50.0, 0.0), (50.0, 50.0)]
        );
    }

    // S3: a 20x10 rectangle in a 20x20 bin leaves exactly one 20x10 strip.
    #[test]
    fn half_bin_piece_leaves_one_free_strip() {
        init();
        let solution = pack(
            vec![Piece::rectangle(1, 20.0, 10.0).unwrap()],
            rect(20.0, 20.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();

        assert_solution_invariants(&solution);
        assert_eq!(solution.n_bins(), 1);
        let bin = &solution.bins[0];
        let placed = &bin.placed_pieces()[0];
        assert_eq!(placed.rotation(), 0.0);
        assert!(approx_eq!(f64, placed.bbox().x_min, 0.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, placed.bbox().y_min, 0.0, epsilon = 1e-9));
        assert_eq!(
            bin.free_rects(),
            &[Rect::try_new(0.0, 10.0, 20.0, 20.0).unwrap()]
        );
    }

    // S4: a 40x10 and a 10x40 with the {0, 90} rotation set share one bin.
    #[test]
    fn perpendicular_strips_share_a_bin() {
        init();
        let config = PackConfig {
            stage1_rotations: vec![0.0, 90.0],
            ..PackConfig::default()
        };
        let solution = pack(
            vec![
                Piece::rectangle(1, 40.0, 10.0).unwrap(),
                Piece::rectangle(2, 10.0, 40.0).unwrap(),
            ],
            rect(50.0, 50.0),
            &config,
            &CancelSwitch::new(),
        )
        .unwrap();

        assert_solution_invariants(&solution);
        assert!(solution.is_complete());
        assert_eq!(solution.n_bins(), 1);

        let bin = &solution.bins[0];
        let a = bin.placed_pieces().iter().find(|p| p.id() == 1).unwrap();
        let b = bin.placed_pieces().iter().find(|p| p.id() == 2).unwrap();
        assert!(approx_eq!(f64, a.bbox().x_min, 0.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, a.bbox().y_min, 0.0, epsilon = 1e-9));

        let b_corner = (b.bbox().x_min, b.bbox().y_min);
        assert!(
            (approx_eq!(f64, b_corner.0, 40.0, epsilon = 1e-9)
                && approx_eq!(f64, b_corner.1, 0.0, epsilon = 1e-9))
                || (approx_eq!(f64, b_corner.0, 0.0, epsilon = 1e-9)
                    && approx_eq!(f64, b_corner.1, 10.0, epsilon = 1e-9)),
            "unexpected corner {b_corner:?}"
        );
    }

    // S5: a 25x25 square finds a home despite the L-shape's bbox covering it.
    #[test]
    fn square_coexists_with_an_l_shape() {
        init();
        let solution = pack(
            vec![l_piece(1), square(2, 25.0)],
            rect(100.0, 100.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();

        assert_solution_invariants(&solution);
        assert!(solution.is_complete());
        assert_eq!(solution.n_bins(), 1);
        assert_eq!(solution.bins[0].n_placed(), 2);
        assert!(approx_eq!(
            f64,
            solution.bins[0].occupied_area(),
            2700.0 + 625.0,
            epsilon = 1e-6
        ));
    }

    // S5, NFP leg: validity accepts the notch interior, and the collision
    // oracle agrees at the accepted position.
    #[test]
    fn nfp_validity_accepts_the_notch_interior() {
        init();
        let bin_rect = rect(100.0, 100.0);
        let mut bin = Bin::new(bin_rect, PackConfig::default());
        bin.place_piece(l_piece(1));

        let square = square(2, 25.0);
        let engine = NfpEngine::new();
        let obstacles: Vec<&Piece> = bin.placed_pieces().iter().collect();
        let position = Coord { x: 32.0, y: 32.0 };
        assert!(engine.is_valid_placement(&square, position, &obstacles, &bin_rect));

        let mut candidate = square.clone();
        candidate.place_at(position.x, position.y);
        assert!(!bin.is_collision(&candidate, None));
        // the same position through the NFP-backed oracle
        let nfp_config = PackConfig {
            nfp_collision: true,
            ..PackConfig::default()
        };
        let mut nfp_bin = Bin::new(bin_rect, nfp_config);
        nfp_bin.place_piece(l_piece(1));
        assert!(!nfp_bin.is_collision(&candidate, None));
    }

    // S6: the documented loader example.
    #[test]
    fn loader_example_round_trips_through_the_pipeline() {
        init();
        let input = "100 50\n2\n0,0 10,0 10,10 0,10\n@ 2,2 8,2 8,8 2,8\n0,0 5,0 5,5 0,5\n";
        let instance = parse_instance(input).unwrap();
        assert_eq!(instance.bin, rect(100.0, 50.0));
        assert_eq!(instance.pieces.len(), 2);
        assert!(approx_eq!(f64, instance.pieces[0].area(), 64.0, epsilon = 1e-6));
        assert!(approx_eq!(f64, instance.pieces[1].area(), 25.0, epsilon = 1e-6));

        let solution = pack(
            instance.pieces,
            instance.bin,
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();
        assert_solution_invariants(&solution);
        assert!(solution.is_complete());
        assert_eq!(solution.n_bins(), 1);
    }

    #[test_case(50.0, 50.0; "square bin")]
    #[test_case(100.0, 40.0; "wide bin")]
    #[test_case(25.0, 80.0; "tall bin")]
    fn bin_sized_piece_occupies_everything(w: f64, h: f64) {
        init();
        let solution = pack(
            vec![Piece::rectangle(1, w, h).unwrap()],
            rect(w, h),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();

        assert_solution_invariants(&solution);
        assert_eq!(solution.n_bins(), 1);
        let bin = &solution.bins[0];
        let corner = bin.placed_pieces()[0].bbox();
        assert!(approx_eq!(f64, corner.x_min, 0.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, corner.y_min, 0.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, bin.empty_area(), 0.0, epsilon = 1e-6));
    }

    #[test]
    fn oversized_piece_reports_and_produces_no_bin() {
        init();
        let result = pack(
            vec![square(1, 60.0)],
            rect(50.0, 50.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        );
        assert!(matches!(result, Err(PackError::PieceTooLarge { id: 1, .. })));
    }

    #[test]
    fn empty_input_is_no_error() {
        init();
        let solution = pack(
            vec![],
            rect(50.0, 50.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();
        assert_eq!(solution.n_bins(), 0);
        assert!(solution.is_complete());
    }

    #[test]
    fn mixed_instance_respects_all_invariants() {
        init();
        let mut pieces = vec![
            l_piece(1),
            Piece::rectangle(2, 45.0, 12.0).unwrap(),
            Piece::rectangle(3, 12.0, 45.0).unwrap(),
            square(4, 20.0),
            square(5, 20.0),
            square(6, 9.0),
            Piece::rectangle(7, 30.0, 7.0).unwrap(),
            Piece::new(
                vec![
                    Coord { x: 0.0, y: 0.0 },
                    Coord { x: 18.0, y: 0.0 },
                    Coord { x: 9.0, y: 14.0 },
                ],
                8,
            )
            .unwrap(),
        ];
        // a couple of duplicated shapes to exercise the NFP cache
        pieces.push(square(9, 9.0));
        pieces.push(square(10, 9.0));

        let solution = pack(
            pieces,
            rect(70.0, 70.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();

        assert_solution_invariants(&solution);
        assert!(solution.is_complete());
        assert_eq!(solution.n_placed(), 10);
        // every bin is justified: no bin is empty
        for bin in &solution.bins {
            assert!(bin.n_placed() > 0);
        }
    }

    #[test]
    fn preserve_order_and_sorted_agree_on_feasibility() {
        init();
        let pieces = vec![square(1, 10.0), square(2, 35.0), square(3, 12.0)];
        let sorted = pack(
            pieces.clone(),
            rect(50.0, 50.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();
        let in_order = pack_preserve_order(
            pieces,
            rect(50.0, 50.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();

        assert_solution_invariants(&sorted);
        assert_solution_invariants(&in_order);
        assert!(sorted.is_complete());
        assert!(in_order.is_complete());
        // the sorted pipeline presents the 35x35 square first
        assert_eq!(sorted.bins[0].placed_pieces()[0].id(), 2);
        assert_eq!(in_order.bins[0].placed_pieces()[0].id(), 1);
    }

    #[test]
    fn island_placement_stage_is_usable_end_to_end() {
        init();
        let config = PackConfig {
            island_placement: true,
            ..PackConfig::default()
        };
        let solution = pack(
            vec![l_piece(1), square(2, 25.0), square(3, 10.0)],
            rect(100.0, 100.0),
            &config,
            &CancelSwitch::new(),
        )
        .unwrap();
        assert_solution_invariants(&solution);
        assert!(solution.is_complete());
        assert_eq!(solution.n_bins(), 1);
    }

    // The NFP oracle is conservative where regions degenerate to lines:
    // when an obstacle's NFP swallows the whole inner-fit region, flush
    // placements are rejected even though the precise oracle allows them.
    #[test]
    fn nfp_oracle_is_conservative_about_flush_placements() {
        init();
        let config = PackConfig {
            nfp_collision: true,
            ..PackConfig::default()
        };
        let pieces = (1..=2).map(|id| square(id, 50.0)).collect();
        let solution = pack(pieces, rect(100.0, 100.0), &config, &CancelSwitch::new()).unwrap();

        assert_solution_invariants(&solution);
        assert!(solution.is_complete());
        // the precise oracle packs both into one bin; the NFP oracle
        // refuses the flush second placement and opens another bin
        assert_eq!(solution.n_bins(), 2);
        for bin in &solution.bins {
            assert_eq!(bin.n_placed(), 1);
        }

        let precise = pack(
            (1..=2).map(|id| square(id, 50.0)).collect(),
            rect(100.0, 100.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();
        assert_eq!(precise.n_bins(), 1);
    }

    #[test]
    fn output_files_follow_the_documented_format() {
        init();
        let solution = pack(
            vec![square(1, 30.0), square(2, 30.0)],
            rect(50.0, 50.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();

        let dir = std::env::temp_dir().join(format!("mrp-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let paths = write_bin_files(&solution.bins, &dir).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("Bin-1.txt"));
        assert!(paths[1].ends_with("Bin-2.txt"));

        let content = fs::read_to_string(&paths[0]).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "1");
        assert_eq!(lines[1], "1 0 0,0");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn cancellation_returns_partial_bins() {
        init();
        let cancel = CancelSwitch::new();
        cancel.cancel();
        let solution = pack(
            vec![square(1, 10.0), square(2, 10.0)],
            rect(50.0, 50.0),
            &PackConfig::default(),
            &cancel,
        )
        .unwrap();
        assert_eq!(solution.n_bins(), 0);
        assert_eq!(solution.unplaced.len(), 2);
    }

    #[test]
    fn nfp_cache_is_shared_across_bins() {
        init();
        // two bins of identical squares: the second bin's collision
        // lookups should reuse the first bin's NFPs
        let config = PackConfig {
            nfp_collision: true,
            ..PackConfig::default()
        };
        let solution = pack(
            vec![square(1, 30.0), square(2, 30.0), square(3, 30.0)],
            rect(50.0, 50.0),
            &config,
            &CancelSwitch::new(),
        )
        .unwrap();

        assert_solution_invariants(&solution);
        assert!(solution.is_complete());
        assert!(solution.n_bins() >= 2);
        let stats = solution.bins[0].nfp_engine().cache_stats();
        assert!(stats.hits > 0, "expected cache reuse, got {stats:?}");
    }
}
