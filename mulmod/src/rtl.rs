//! SystemVerilog include file for the generated multiplier.
//!
//! Sections, in order: declarations, first-stage windows, reduction tables
//! and their addressing, accumulator delay line, second-stage windows, final
//! reduction, table write/shift pipeline. Every register except the write
//! path advances only while `o_mul.rdy` holds.

use core::fmt::{self, Display, Formatter, Write as _};

use fpga::RAM_PIPE;

use crate::{
    reduce::ReductionTable,
    tree::{Operand, Policy, Signal, Stage, Summation},
    Design,
};

/// Renders a [`Design`].
pub struct Rtl<'a>(pub &'a Design);

const ADVANCE: &str = "always_ff @ (posedge i_clk) if (o_mul.rdy)";

impl<'a> Display for Rtl<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let design = self.0;
        self.declarations(f)?;
        for sum in &design.accumulators {
            summation(f, sum)?;
        }
        self.tables(f)?;
        self.delay_line(f)?;
        for sum in &design.combiners {
            summation(f, sum)?;
        }
        self.final_reduction(f)?;
        self.write_path(f)
    }
}

impl<'a> Rtl<'a> {
    fn declarations(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let design = self.0;
        let params = &design.params;
        let modulus_bits = params.modulus_bits();
        let windows = params.reduced_windows();
        let widest = |sums: &[Summation]| sums.iter().map(|s| s.width).max().unwrap_or(0).max(1);
        let accum_w = widest(&design.accumulators[..]);
        let accum2_w = widest(&design.combiners[..]);

        writeln!(
            f,
            "localparam logic [{}:0] REDUCE_MODULUS = {}'h{:x};",
            modulus_bits - 1,
            modulus_bits,
            params.modulus
        )?;
        writeln!(f)?;
        writeln!(f, "logic [{}:0] accum_grid_o [{}];", accum_w - 1, params.max_coef())?;
        writeln!(f, "logic [{}:0] accum_grid_o_r [{}];", accum_w - 1, windows)?;
        writeln!(f, "logic [{}:0] accum_grid_o_rr [{}];", accum_w - 1, windows)?;
        writeln!(f, "logic [{}:0] accum2_grid_o [{}];", accum2_w - 1, windows)?;
        writeln!(f, "logic [{}:0] res0_c, res0_r, res0_rr;", design.reducer.sum_width - 1)?;
        writeln!(f, "logic [{}:0] res1_c;", modulus_bits + 1)?;
        writeln!(f, "logic signed [{}:0] res1_m_c, res1_m_c_;", modulus_bits + 1)
    }

    fn tables(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let design = self.0;
        let params = &design.params;
        let count = design.tables.len() + 1;

        for table in design.all_tables() {
            let ultra = params.uram_percent * count > 100 * table.index;
            declare_table(f, table, ultra, params.use_init)?;
        }

        for table in &design.tables {
            writeln!(f, "{} {}_q <= {}_ram[{}_a];", ADVANCE, table.name, table.name, table.name)?;
        }

        writeln!(f)?;
        writeln!(f, "{} begin", ADVANCE)?;
        for table in &design.tables {
            for seg in &table.segments {
                writeln!(
                    f,
                    "  {}_a[{}+:{}] <= accum_grid_o[{}][{}+:{}];",
                    table.name, seg.addr_low, seg.width, seg.coef, seg.bit, seg.width
                )?;
            }
        }
        writeln!(f, "end")
    }

    fn delay_line(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "{} begin", ADVANCE)?;
        writeln!(f, "  for (int i = 0; i < {}; i++) begin", self.0.params.reduced_windows())?;
        writeln!(f, "    accum_grid_o_r[i] <= accum_grid_o[i];")?;
        writeln!(f, "    accum_grid_o_rr[i] <= accum_grid_o_r[i];")?;
        writeln!(f, "  end")?;
        writeln!(f, "end")
    }

    fn final_reduction(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let design = self.0;
        let params = &design.params;
        let modulus_bits = params.modulus_bits();
        let name = &design.reducer.table.name;

        let terms: Vec<_> = design
            .combiners
            .iter()
            .map(|sum| match sum.index * params.grid {
                0 => format!("accum2_grid_o[{}]", sum.index),
                shift => format!("(accum2_grid_o[{}] << {})", sum.index, shift),
            })
            .collect();

        writeln!(f)?;
        writeln!(f, "always_comb res0_c = {};", terms.join(" + "))?;
        writeln!(f, "always_comb {}_a = res0_r[{}+:{}];", name, modulus_bits, params.ram_a_w)?;
        writeln!(f, "{} begin", ADVANCE)?;
        writeln!(f, "  res0_r <= res0_c;")?;
        writeln!(f, "  res0_rr <= res0_r;")?;
        writeln!(f, "  {}_q <= {}_ram[{}_a];", name, name, name)?;
        writeln!(f, "end")?;
        writeln!(f, "always_comb begin")?;
        writeln!(f, "  res1_c = res0_rr[{}:0] + {}_q;", modulus_bits - 1, name)?;
        writeln!(f, "  res1_m_c = res1_c - REDUCE_MODULUS;")?;
        writeln!(f, "  res1_m_c_ = res1_c - 2*REDUCE_MODULUS;")?;
        writeln!(f, "end")
    }

    fn write_path(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let design = self.0;
        let params = &design.params;
        let modulus_bits = params.modulus_bits();
        let tables: Vec<_> = design.all_tables().collect();

        writeln!(f)?;
        writeln!(f, "localparam int RAM_PIPE = {};", RAM_PIPE)?;
        writeln!(f, "logic [RAM_PIPE:0][{}:0] addr;", params.ram_a_w - 1)?;
        writeln!(f, "logic [RAM_PIPE:0][{}:0] ram_d;", params.ram_d_w - 1)?;
        writeln!(f, "logic [RAM_PIPE:0] ram_we;")?;
        writeln!(f, "logic [RAM_PIPE:0] ram_se;")?;
        writeln!(f)?;
        f.write_str(
            "always_ff @ (posedge i_clk) begin
  if (i_rst) begin
    addr <= 0;
    ram_we <= 0;
    ram_se <= 0;
    ram_d <= 0;
  end else begin
    ram_we <= {ram_we, i_ram_we};
    ram_d <= {ram_d, i_ram_d};
    ram_se <= {ram_se, i_ram_se};
    for (int i = 1; i <= RAM_PIPE; i++)
      addr[i] <= addr[i-1];
    if (ram_we[RAM_PIPE]) begin
      addr[0] <= addr[0] + 1;
",
        )?;
        for table in &tables {
            writeln!(f, "      {}_ram[addr[RAM_PIPE]] <= {}_d;", table.name, table.name)?;
        }
        writeln!(f, "    end")?;
        writeln!(f, "    if (ram_se[RAM_PIPE]) begin")?;
        let mut previous = "ram_d[RAM_PIPE]".to_string();
        for table in &tables {
            writeln!(f, "      {}_d <= {{{}_d, {}}};", table.name, table.name, previous)?;
            previous = format!(
                "{}_d[{}:{}]",
                table.name,
                modulus_bits - 1,
                modulus_bits - params.ram_d_w
            );
        }
        writeln!(f, "    end")?;
        writeln!(f, "  end")?;
        writeln!(f, "end")
    }
}

fn declare_table(f: &mut Formatter<'_>, table: &ReductionTable, ultra: bool, init: bool) -> fmt::Result {
    let (name, data) = (&table.name, table.data_width - 1);
    writeln!(f)?;
    writeln!(f, "logic [{}:0] {}_a;", table.address_width() - 1, name)?;
    writeln!(f, "(* DONT_TOUCH = \"yes\" *) logic [{}:0] {}_q;", data, name)?;
    writeln!(f, "logic [{}:0] {}_d;", data, name)?;
    if ultra {
        f.write_str("(* ram_style=\"ultra\" *) ")?;
    }
    writeln!(f, "logic [{}:0] {}_ram [{}];", data, name, table.depth())?;
    if init {
        writeln!(f, "initial $readmemh(\"{}.mem\", {}_ram);", name, name)?;
    }
    Ok(())
}

fn source(signal: Signal) -> String {
    match signal {
        Signal::Product { col, row } => format!("mul_grid[{}][{}]", col, row),
        Signal::Table(index) => format!("mod_ram_{}_q", index),
        Signal::Accum(c) => format!("accum_grid_o_rr[{}]", c),
    }
}

/// `{ {hi{1'd0}}, src[lsb+:width], {shift{1'd0}} }`, empty pads left out.
pub fn operand(op: &Operand) -> String {
    let mut parts = Vec::with_capacity(3);
    if op.high_padding() > 0 {
        parts.push(format!("{{{}{{1'd0}}}}", op.high_padding()));
    }
    parts.push(format!("{}[{}+:{}]", source(op.signal), op.lsb, op.width));
    if op.shift > 0 {
        parts.push(format!("{{{}{{1'd0}}}}", op.shift));
    }
    format!("{{ {} }}", parts.join(", "))
}

fn summation(f: &mut Formatter<'_>, sum: &Summation) -> fmt::Result {
    let (comment, reg, prefix, instance) = match sum.stage {
        Stage::Accumulate => (format!("Coef {}", sum.index), "accum_grid_o", "accum", "ct"),
        Stage::Combine => (format!("Coef {} accum 2 stage", sum.index), "accum2_grid_o", "accum2", "ct2"),
    };
    let i = sum.index;
    let operands: Vec<_> = sum.operands.iter().map(operand).collect();

    writeln!(f)?;
    writeln!(f, "// {}", comment)?;
    match sum.policy() {
        Policy::Zero => writeln!(f, "{} {}[{}] <= 0;", ADVANCE, reg, i),
        Policy::Direct | Policy::Add => {
            writeln!(f, "{} {}[{}] <= {};", ADVANCE, reg, i, operands.join(" + "))
        }
        Policy::Compress(node) => {
            let mut block = String::new();
            let msb = node.bit_len - 1;
            writeln!(block, "logic [{}:0] {}_i_{} [{}];", msb, prefix, i, node.num_elements)?;
            writeln!(block, "logic [{}:0] {}_o_c_{}, {}_o_s_{};", msb, prefix, i, prefix, i)?;
            writeln!(block, "compressor_tree_3_to_2 #(")?;
            writeln!(block, "  .NUM_ELEMENTS({}),", node.num_elements)?;
            writeln!(block, "  .BIT_LEN({})", node.bit_len)?;
            writeln!(block, ")")?;
            writeln!(block, "{}_{} (", instance, i)?;
            writeln!(block, "  .terms({}_i_{}),", prefix, i)?;
            writeln!(block, "  .C({}_o_c_{}),", prefix, i)?;
            writeln!(block, "  .S({}_o_s_{})", prefix, i)?;
            writeln!(block, ");")?;
            writeln!(block, "always_comb {}_i_{} = {{{}}};", prefix, i, operands.join(", "))?;
            writeln!(
                block,
                "{} {}[{}] <= {}_o_c_{} + {}_o_s_{};",
                ADVANCE, reg, i, prefix, i, prefix, i
            )?;
            f.write_str(&block)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{testing::toy_parameters, Parameters};

    fn toy_rtl(params: Parameters) -> String {
        Rtl(&Design::build(params).unwrap()).to_string()
    }

    #[test]
    fn operand_padding() {
        let op = Operand {
            signal: Signal::Product { col: 0, row: 1 },
            lsb: 0,
            width: 2,
            shift: 2,
            padded: 6,
        };
        assert_eq!(operand(&op), "{ {2{1'd0}}, mul_grid[0][1][0+:2], {2{1'd0}} }");
        let bare = Operand {
            signal: Signal::Accum(3),
            lsb: 1,
            width: 5,
            shift: 0,
            padded: 5,
        };
        assert_eq!(operand(&bare), "{ accum_grid_o_rr[3][1+:5] }");
    }

    #[test]
    fn toy_sections_in_order() {
        let rtl = toy_rtl(toy_parameters());
        assert!(rtl.starts_with("localparam logic [3:0] REDUCE_MODULUS = 4'hd;\n"));

        let markers = [
            "logic [5:0] accum_grid_o [2];",
            "// Coef 0\n",
            "// Coef 1\n",
            "logic [2:0] mod_ram_0_a;",
            "mod_ram_0_a[0+:3] <= accum_grid_o[1][0+:3];",
            "mod_ram_1_a[0+:3] <= accum_grid_o[1][3+:3];",
            "accum_grid_o_rr[i] <= accum_grid_o_r[i];",
            "// Coef 0 accum 2 stage\n",
            "always_comb res0_c = accum2_grid_o[0];",
            "mod_ram2_0_a = res0_r[4+:3];",
            "res1_m_c_ = res1_c - 2*REDUCE_MODULUS;",
            "localparam int RAM_PIPE = 4;",
        ];
        let mut at = 0;
        for marker in markers {
            let found = rtl[at..].find(marker).unwrap_or_else(|| panic!("missing {:?}", marker));
            at += found + marker.len();
        }
    }

    #[test]
    fn toy_compressor_instances() {
        let rtl = toy_rtl(toy_parameters());
        assert!(rtl.contains(
            "compressor_tree_3_to_2 #(\n  .NUM_ELEMENTS(3),\n  .BIT_LEN(6)\n)\nct_0 (\n  .terms(accum_i_0),\n  .C(accum_o_c_0),\n  .S(accum_o_s_0)\n);\n"
        ));
        assert!(rtl.contains(
            "always_comb accum_i_0 = {{ {2{1'd0}}, mul_grid[0][0][0+:4] }, { {2{1'd0}}, mul_grid[0][1][0+:2], {2{1'd0}} }, { {2{1'd0}}, mul_grid[1][0][0+:2], {2{1'd0}} }};"
        ));
        assert!(rtl.contains("ct2_0 (\n  .terms(accum2_i_0),"));
        assert!(rtl.contains(
            "always_comb accum2_i_0 = {{ {4{1'd0}}, mod_ram_0_q[0+:4] }, { {4{1'd0}}, mod_ram_1_q[0+:4] }, { {2{1'd0}}, accum_grid_o_rr[0][0+:6] }};"
        ));
        assert!(rtl.contains(&format!("{} accum2_grid_o[0] <= accum2_o_c_0 + accum2_o_s_0;", ADVANCE)));
    }

    #[test]
    fn write_path_chains_every_table() {
        let rtl = toy_rtl(toy_parameters());
        for line in [
            "      mod_ram_0_ram[addr[RAM_PIPE]] <= mod_ram_0_d;",
            "      mod_ram2_0_ram[addr[RAM_PIPE]] <= mod_ram2_0_d;",
            "      mod_ram_0_d <= {mod_ram_0_d, ram_d[RAM_PIPE]};",
            "      mod_ram_1_d <= {mod_ram_1_d, mod_ram_0_d[3:2]};",
            "      mod_ram2_0_d <= {mod_ram2_0_d, mod_ram_1_d[3:2]};",
        ] {
            assert!(rtl.contains(line), "missing {:?}", line);
        }
        assert!(rtl.contains("logic [RAM_PIPE:0][1:0] ram_d;"));
    }

    #[test]
    fn table_attributes() {
        let rtl = toy_rtl(Parameters {
            uram_percent: 50,
            ..toy_parameters()
        });
        assert!(rtl.contains("(* ram_style=\"ultra\" *) logic [3:0] mod_ram_0_ram [8];"));
        assert!(rtl.contains("(* ram_style=\"ultra\" *) logic [3:0] mod_ram_1_ram [8];"));
        assert!(rtl.contains("\nlogic [3:0] mod_ram2_0_ram [8];"));
        assert!(rtl.contains("(* DONT_TOUCH = \"yes\" *) logic [3:0] mod_ram_0_q;"));
        assert!(rtl.contains("initial $readmemh(\"mod_ram2_0.mem\", mod_ram2_0_ram);"));

        let bare = toy_rtl(Parameters {
            use_init: false,
            ..toy_parameters()
        });
        assert!(!bare.contains("$readmemh"));
        assert!(!bare.contains("ultra"));
    }

    #[test]
    fn default_second_stage_shifts() {
        let rtl = toy_rtl(Parameters::default());
        assert!(rtl.contains("(accum2_grid_o[5] << 320)"));
        assert!(rtl.contains("mod_ram2_0_a = res0_r[381+:10];"));
        assert!(rtl.contains("logic [390:0] res0_c, res0_r, res0_rr;"));
    }
}
