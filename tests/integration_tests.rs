mod integration {
    mod audio_tests;
    mod cli_tests;
    mod collision_tests;
    mod image_tests;
    mod scan_tests;
    mod store_tests;
    mod undo_tests;
}
