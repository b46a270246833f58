fn main() -> std::io::Result<()> {
    sheet_intake_lib::run()
}
