pub mod header;
pub mod output_pane;
pub mod status_table;
